use super::Translator;
use crate::context::ContextVector;
use crate::engine::{count_accelerators, EngineApi, EngineError};
use crate::error::{Result, TranslationError};
use crate::types::{LanguagePair, Priority};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 构造时上下文的来源，三者互斥
#[derive(Debug, Clone, Default)]
pub enum ContextSource {
    #[default]
    None,
    Vector(ContextVector),
    File(PathBuf),
    Text(String),
}

impl ContextSource {
    /// 显式向量优先，其次文件，最后文本
    pub fn from_options(
        vector: Option<ContextVector>,
        file: Option<PathBuf>,
        text: Option<String>,
    ) -> Self {
        match (vector, file, text) {
            (Some(vector), _, _) => ContextSource::Vector(vector),
            (None, Some(file), _) => ContextSource::File(file),
            (None, None, Some(text)) => ContextSource::Text(text),
            (None, None, None) => ContextSource::None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub priority: Priority,
    pub context: ContextSource,
    /// 多行单元逐行翻译，空行原样保留
    pub split_lines: bool,
    /// 覆盖自动探测的 GPU 数量
    pub accelerators: Option<usize>,
}

/// 集群托管引擎后端
pub struct EngineTranslator {
    api: Arc<dyn EngineApi>,
    languages: LanguagePair,
    priority: Priority,
    context: Option<ContextVector>,
    split_lines: bool,
    accelerators: Option<usize>,
}

impl EngineTranslator {
    const MIN_CONCURRENCY: usize = 10;
    const WORKERS_PER_EXECUTOR: usize = 2;

    /// 创建后端，必要时通过节点 API 解析上下文向量
    pub async fn connect(
        api: Arc<dyn EngineApi>,
        languages: LanguagePair,
        options: EngineOptions,
    ) -> Result<Self> {
        let context = match options.context {
            ContextSource::None => None,
            ContextSource::Vector(vector) => Some(vector),
            ContextSource::File(path) => Some(
                api.context_from_file(&languages.source, &languages.target, &path)
                    .await
                    .map_err(|e| wrap_error(api.as_ref(), e))?,
            ),
            ContextSource::Text(text) => Some(
                api.context_from_text(&languages.source, &languages.target, &text)
                    .await
                    .map_err(|e| wrap_error(api.as_ref(), e))?,
            ),
        };

        Ok(Self {
            api,
            languages,
            priority: options.priority,
            context,
            split_lines: options.split_lines,
            accelerators: options.accelerators,
        })
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// 构造时确定的上下文向量
    pub fn context_vector(&self) -> Option<ContextVector> {
        self.context.clone()
    }

    async fn translate_line(&self, line: &str, context: Option<&ContextVector>) -> Result<String> {
        let translation = self
            .api
            .translate(
                &self.languages.source,
                &self.languages.target,
                line,
                context,
                self.priority,
            )
            .await
            .map_err(|e| wrap_error(self.api.as_ref(), e))?;

        Ok(translation.translation)
    }
}

fn wrap_error(api: &dyn EngineApi, error: EngineError) -> TranslationError {
    match error {
        EngineError::Connection(cause) => {
            debug!(%cause, "engine unreachable");
            TranslationError::Connection(format!(
                "Unable to connect to ModernMT. Please check if engine is running at {}.",
                api.endpoint()
            ))
        }
        EngineError::Api { cause } => TranslationError::Remote(cause),
        EngineError::Io(e) => TranslationError::Io(e),
    }
}

#[async_trait]
impl Translator for EngineTranslator {
    fn name(&self) -> &str {
        "ModernMT"
    }

    fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    async fn default_concurrency(&self) -> Result<usize> {
        let executors = match self.accelerators {
            Some(count) => count,
            None => count_accelerators().await,
        }
        .max(1);

        let info = self
            .api
            .info()
            .await
            .map_err(|e| wrap_error(self.api.as_ref(), e))?;
        let nodes = info.cluster.nodes.len().max(1);

        Ok((executors * nodes * Self::WORKERS_PER_EXECUTOR).max(Self::MIN_CONCURRENCY))
    }

    async fn translate(&self, text: &str, context: Option<&ContextVector>) -> Result<String> {
        let context = context.or(self.context.as_ref());

        if !self.split_lines {
            if text.trim().is_empty() {
                return Ok(text.to_string());
            }
            return self.translate_line(text, context).await;
        }

        let mut translations = Vec::new();
        for line in text.split('\n') {
            if line.trim().is_empty() {
                translations.push(line.to_string());
            } else {
                translations.push(self.translate_line(line, context).await?);
            }
        }

        Ok(translations.join("\n"))
    }

    async fn context_for_file(&self, path: &Path) -> Result<Option<ContextVector>> {
        if self.context.is_some() {
            return Ok(None);
        }

        let context = self
            .api
            .context_from_file(&self.languages.source, &self.languages.target, path)
            .await
            .map_err(|e| wrap_error(self.api.as_ref(), e))?;

        Ok(Some(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClusterInfo, EngineInfo, EngineTranslation};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockEngine {
        nodes: usize,
        unreachable: bool,
        calls: Mutex<Vec<(String, Option<String>, Priority)>>,
        context_requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EngineApi for MockEngine {
        fn endpoint(&self) -> &str {
            "http://localhost:8045"
        }

        async fn translate(
            &self,
            _source: &str,
            _target: &str,
            text: &str,
            context: Option<&ContextVector>,
            priority: Priority,
        ) -> std::result::Result<EngineTranslation, EngineError> {
            if self.unreachable {
                return Err(EngineError::Connection("connection refused".into()));
            }
            if text == "fail" {
                return Err(EngineError::Api { cause: "(ValidationException) bad text".into() });
            }
            self.calls.lock().unwrap().push((
                text.to_string(),
                context.map(|c| c.to_string()),
                priority,
            ));
            Ok(EngineTranslation { translation: format!("<T({})>", text) })
        }

        async fn context_from_file(
            &self,
            _source: &str,
            _target: &str,
            path: &Path,
        ) -> std::result::Result<ContextVector, EngineError> {
            self.context_requests
                .lock()
                .unwrap()
                .push(format!("file:{}", path.display()));
            Ok("7:0.5".parse().unwrap())
        }

        async fn context_from_text(
            &self,
            _source: &str,
            _target: &str,
            text: &str,
        ) -> std::result::Result<ContextVector, EngineError> {
            self.context_requests.lock().unwrap().push(format!("text:{}", text));
            Ok("8:0.25".parse().unwrap())
        }

        async fn info(&self) -> std::result::Result<EngineInfo, EngineError> {
            Ok(EngineInfo {
                cluster: ClusterInfo { nodes: vec![serde_json::Value::Null; self.nodes] },
            })
        }
    }

    fn pair() -> LanguagePair {
        LanguagePair::new("en", "it")
    }

    async fn build(mock: Arc<MockEngine>, options: EngineOptions) -> EngineTranslator {
        EngineTranslator::connect(mock, pair(), options).await.unwrap()
    }

    #[tokio::test]
    async fn split_lines_keeps_blank_lines() {
        let mock = Arc::new(MockEngine::default());
        let translator = build(
            mock.clone(),
            EngineOptions { split_lines: true, ..Default::default() },
        )
        .await;

        let out = translator.translate("Hello\n\nWorld", None).await.unwrap();
        assert_eq!(out, "<T(Hello)>\n\n<T(World)>");

        let texts: Vec<String> = mock.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
        assert_eq!(texts, vec!["Hello", "World"]);
    }

    #[tokio::test]
    async fn without_split_the_unit_is_sent_whole() {
        let mock = Arc::new(MockEngine::default());
        let translator = build(mock.clone(), EngineOptions::default()).await;

        let out = translator.translate("Hello\nWorld", None).await.unwrap();
        assert_eq!(out, "<T(Hello\nWorld)>");
        assert_eq!(mock.calls.lock().unwrap()[0].2, Priority::Background);
    }

    #[tokio::test]
    async fn explicit_vector_wins_over_file_and_text() {
        let mock = Arc::new(MockEngine::default());
        let source = ContextSource::from_options(
            Some("1:0.5".parse().unwrap()),
            Some(PathBuf::from("ctx.txt")),
            Some("sample".into()),
        );
        let translator = build(mock.clone(), EngineOptions { context: source, ..Default::default() }).await;

        assert_eq!(translator.context_vector().unwrap().to_string(), "1:0.5");
        assert!(mock.context_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_resolved_from_text_is_used_by_default() {
        let mock = Arc::new(MockEngine::default());
        let source = ContextSource::from_options(None, None, Some("medical".into()));
        let translator = build(
            mock.clone(),
            EngineOptions { context: source, priority: Priority::High, ..Default::default() },
        )
        .await;

        translator.translate("Dose", None).await.unwrap();
        let calls = mock.calls.lock().unwrap();
        assert_eq!(calls[0].1.as_deref(), Some("8:0.25"));
        assert_eq!(calls[0].2, Priority::High);
        assert_eq!(*mock.context_requests.lock().unwrap(), vec!["text:medical"]);
    }

    #[tokio::test]
    async fn call_context_overrides_without_mutation() {
        let mock = Arc::new(MockEngine::default());
        let translator = build(
            mock.clone(),
            EngineOptions {
                context: ContextSource::Vector("1:1".parse().unwrap()),
                ..Default::default()
            },
        )
        .await;

        let call_context: ContextVector = "2:0.5".parse().unwrap();
        translator.translate("a", Some(&call_context)).await.unwrap();
        translator.translate("b", None).await.unwrap();

        let calls = mock.calls.lock().unwrap();
        assert_eq!(calls[0].1.as_deref(), Some("2:0.5"));
        assert_eq!(calls[1].1.as_deref(), Some("1:1"));
    }

    #[tokio::test]
    async fn file_context_only_when_unconfigured() {
        let mock = Arc::new(MockEngine::default());
        let unconfigured = build(mock.clone(), EngineOptions::default()).await;
        let derived = unconfigured.context_for_file(Path::new("in.txt")).await.unwrap();
        assert_eq!(derived.unwrap().to_string(), "7:0.5");
        assert!(unconfigured.context_vector().is_none());

        let configured = build(
            mock.clone(),
            EngineOptions {
                context: ContextSource::Vector("1:1".parse().unwrap()),
                ..Default::default()
            },
        )
        .await;
        assert!(configured.context_for_file(Path::new("in.txt")).await.unwrap().is_none());
        assert_eq!(mock.context_requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_concurrency_scales_with_cluster() {
        let big = build(
            Arc::new(MockEngine { nodes: 3, ..Default::default() }),
            EngineOptions { accelerators: Some(4), ..Default::default() },
        )
        .await;
        assert_eq!(big.default_concurrency().await.unwrap(), 24);

        let small = build(
            Arc::new(MockEngine { nodes: 0, ..Default::default() }),
            EngineOptions { accelerators: Some(0), ..Default::default() },
        )
        .await;
        assert_eq!(small.default_concurrency().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn errors_are_classified() {
        let down = build(
            Arc::new(MockEngine { unreachable: true, ..Default::default() }),
            EngineOptions::default(),
        )
        .await;
        let err = down.translate("Hello", None).await.unwrap_err();
        assert!(matches!(err, TranslationError::Connection(ref m) if m.contains("localhost:8045")));

        let up = build(Arc::new(MockEngine::default()), EngineOptions::default()).await;
        let err = up.translate("fail", None).await.unwrap_err();
        assert!(matches!(err, TranslationError::Remote(ref m) if m == "(ValidationException) bad text"));
    }
}
