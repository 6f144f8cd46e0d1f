//! 配置管理模块
//!
//! 提供TOML配置文件的读取、写入和自动发现功能，并根据配置构造翻译后端。

use crate::context::ContextVector;
use crate::dispatch::RunOptions;
use crate::engine::RestEngineClient;
use crate::error::{Result, TranslationError};
use crate::translator::{
    ContextSource, EchoTranslator, EngineOptions, EngineTranslator, EnterpriseTranslator,
    GoogleTranslator, Translator,
};
use crate::types::{BackendKind, LanguagePair, Priority, RetryConfig, TranslationConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 集群引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_url: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub split_lines: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_vector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerators: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8045".to_string(),
            priority: Priority::Background,
            split_lines: false,
            context_vector: None,
            context_file: None,
            context_string: None,
            accelerators: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub api_key: String,
    pub url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: crate::translator::GOOGLE_TRANSLATE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterpriseConfig {
    #[serde(default)]
    pub api_key: String,
    pub url: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_vector: Option<String>,
}

impl Default for EnterpriseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: crate::translator::ENTERPRISE_URL.to_string(),
            priority: Priority::Background,
            context_vector: None,
        }
    }
}

/// 管道配置
///
/// # 示例
///
/// ```rust
/// use ordered_translator::PipelineConfig;
///
/// let config = PipelineConfig::from_toml_str(r#"
/// [translation]
/// backend = "echo"
/// source_lang = "en"
/// target_lang = "de"
/// threads = 4
/// "#).unwrap();
///
/// assert_eq!(config.run_options().concurrency, Some(4));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub enterprise: EnterpriseConfig,
    #[serde(default)]
    pub rate_control: RetryConfig,
}

impl PipelineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TranslationError::Config(e.to_string()))
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| TranslationError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from multiple possible locations
    pub fn load_from_default_locations() -> Self {
        let possible_paths = [
            "translation-config.toml",
            "config.toml",
            ".translation-config.toml",
        ];

        for path in &possible_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        info!("Loaded configuration from: {}", path);
                        return config;
                    }
                    Err(e) => {
                        warn!("Failed to load config from {}: {}", path, e);
                    }
                }
            }
        }

        info!("No configuration file found, using defaults");
        Self::default()
    }

    /// Generate example configuration file
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }

    pub fn languages(&self) -> LanguagePair {
        LanguagePair::new(&self.translation.source_lang, &self.translation.target_lang)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            concurrency: self.translation.threads,
            best_effort: self.translation.best_effort,
            context: None,
        }
    }

    /// 按 `[translation].backend` 构造后端
    pub async fn build_translator(&self) -> Result<Arc<dyn Translator>> {
        let languages = self.languages();

        let translator: Arc<dyn Translator> = match self.translation.backend {
            BackendKind::Echo => Arc::new(EchoTranslator::new(languages)),
            BackendKind::Engine => {
                let engine = &self.engine;
                let options = EngineOptions {
                    priority: engine.priority,
                    context: ContextSource::from_options(
                        parse_context(engine.context_vector.as_deref())?,
                        engine.context_file.clone(),
                        engine.context_string.clone(),
                    ),
                    split_lines: engine.split_lines,
                    accelerators: engine.accelerators,
                };
                let api = Arc::new(RestEngineClient::new(&engine.base_url));
                Arc::new(EngineTranslator::connect(api, languages, options).await?)
            }
            BackendKind::Google => {
                let key = required_key("google", &self.google.api_key)?;
                Arc::new(
                    GoogleTranslator::with_retry_config(languages, key, self.rate_control.clone())
                        .with_url(&self.google.url),
                )
            }
            BackendKind::Enterprise => {
                let key = required_key("enterprise", &self.enterprise.api_key)?;
                Arc::new(
                    EnterpriseTranslator::new(languages, key)
                        .with_url(&self.enterprise.url)
                        .with_priority(self.enterprise.priority)
                        .with_context(parse_context(self.enterprise.context_vector.as_deref())?),
                )
            }
        };

        info!(translator = translator.name(), "translator ready");
        Ok(translator)
    }
}

fn parse_context(text: Option<&str>) -> Result<Option<ContextVector>> {
    text.map(str::parse).transpose()
}

fn required_key<'a>(section: &str, key: &'a str) -> Result<&'a str> {
    if key.trim().is_empty() {
        return Err(TranslationError::Config(format!(
            "[{}] api_key is required for this backend",
            section
        )));
    }
    Ok(key)
}
