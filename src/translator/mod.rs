//! 翻译后端
//!
//! 所有后端实现同一个 [`Translator`] 接口：名称、默认并发数、单条翻译。
//! 调度器只通过该接口与后端交互。

mod echo;
mod engine;
mod enterprise;
mod google;

pub use echo::EchoTranslator;
pub use engine::{ContextSource, EngineOptions, EngineTranslator};
pub use enterprise::{EnterpriseTranslator, ENTERPRISE_URL};
pub use google::{normalize_language, GoogleTranslator, GOOGLE_TRANSLATE_URL};

use crate::context::ContextVector;
use crate::error::Result;
use crate::types::LanguagePair;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 翻译后端接口
///
/// `context` 为单次调用的上下文覆盖，只在本次调用中生效，
/// 不会修改后端自身的配置。
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    fn languages(&self) -> &LanguagePair;

    /// 未指定并发数时使用的工作任务数量
    async fn default_concurrency(&self) -> Result<usize>;

    async fn translate(&self, text: &str, context: Option<&ContextVector>) -> Result<String>;

    /// 翻译整个文件前调用，返回仅对该文件生效的上下文
    async fn context_for_file(&self, _path: &Path) -> Result<Option<ContextVector>> {
        Ok(None)
    }
}

pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(16)
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(concat!("ordered-translator/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to create optimized client: {}, using default", e);
            Client::new()
        })
}
