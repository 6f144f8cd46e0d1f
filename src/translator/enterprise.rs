use super::Translator;
use crate::context::ContextVector;
use crate::error::{Result, TranslationError};
use crate::types::{
    EnterpriseErrorResponse, EnterpriseRequest, EnterpriseResponse, LanguagePair, Priority,
};
use async_trait::async_trait;
use reqwest::Client;

pub const ENTERPRISE_URL: &str = "https://api.modernmt.com/translate";

/// 企业版托管 API 后端
///
/// 无自适应延迟；优先级与上下文向量随每个请求发送。
pub struct EnterpriseTranslator {
    languages: LanguagePair,
    api_key: String,
    url: String,
    priority: Priority,
    context: Option<ContextVector>,
    client: Client,
}

impl EnterpriseTranslator {
    pub const DEFAULT_CONCURRENCY: usize = 8;

    pub fn new(languages: LanguagePair, api_key: impl Into<String>) -> Self {
        Self {
            languages,
            api_key: api_key.into(),
            url: ENTERPRISE_URL.to_string(),
            priority: Priority::Background,
            context: None,
            client: super::http_client(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, context: Option<ContextVector>) -> Self {
        self.context = context;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// 尽量从错误体中提取 `(type) message`，失败时退回原始响应
fn describe_failure(body: &str) -> String {
    match serde_json::from_str::<EnterpriseErrorResponse>(body) {
        Ok(parsed) => format!("({}) {}", parsed.error.kind, parsed.error.message),
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl Translator for EnterpriseTranslator {
    fn name(&self) -> &str {
        "ModernMT Enterprise"
    }

    fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    async fn default_concurrency(&self) -> Result<usize> {
        Ok(Self::DEFAULT_CONCURRENCY)
    }

    async fn translate(&self, text: &str, context: Option<&ContextVector>) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let form = EnterpriseRequest {
            source: &self.languages.source,
            target: &self.languages.target,
            q: text,
            priority: self.priority.as_str(),
            context_vector: context.or(self.context.as_ref()).map(|c| c.to_string()),
        };

        let response = self
            .client
            .post(&self.url)
            .header("X-HTTP-Method-Override", "GET")
            .header("MMT-ApiKey", self.api_key.as_str())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                TranslationError::Connection(format!("Unable to connect to ModernMT Enterprise: {}", e))
            })?;

        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TranslationError::Remote(format!(
                "HTTP request \"{}\" failed with code {}: {}",
                url,
                status.as_u16(),
                describe_failure(&body)
            )));
        }

        let content: EnterpriseResponse = serde_json::from_str(&body)
            .map_err(|e| TranslationError::Parse(format!("ModernMT Enterprise response: {}", e)))?;
        Ok(content.data.translation)
    }
}
