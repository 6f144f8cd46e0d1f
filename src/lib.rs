//! # Ordered Translator
//!
//! 顺序保持的并行翻译调度库：把大量（可能无界的）文本单元分发到有界的工作任务池，
//! 输出顺序始终与输入顺序一致，与哪个任务先完成无关。
//!
//! ## 主要特性
//!
//! - **顺序保持**: 结果严格按提交顺序交付
//! - **有界并发与背压**: 任务池和待排空队列都有上限
//! - **失败策略**: 默认第一个错误中止批次；容错模式下失败单元输出为空行
//! - **自适应速率控制**: 针对限流阈值未知的托管 API 自动调整请求间隔
//! - **可插拔后端**: 回显、集群引擎、托管 API、企业版 API
//!
//! ## 快速开始
//!
//! ```rust
//! use ordered_translator::{Dispatcher, EchoTranslator, LanguagePair, RunOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let translator = Arc::new(EchoTranslator::new(LanguagePair::new("en", "it")));
//!     let dispatcher = Dispatcher::new(translator);
//!
//!     let input: &[u8] = b"Hello\nworld\n";
//!     let mut output = Vec::new();
//!     let count = dispatcher
//!         .translate_stream(input, &mut output, RunOptions::default().with_concurrency(4))
//!         .await?;
//!
//!     assert_eq!(count, 2);
//!     assert_eq!(output, b"Hello\nworld\n");
//!     Ok(())
//! }
//! ```
//!
//! ## 配置文件支持
//!
//! ```toml
//! [translation]
//! backend = "google"
//! source_lang = "en-US"
//! target_lang = "zh-CN"
//! threads = 5
//! best_effort = false
//!
//! [google]
//! api_key = "..."
//! url = "https://translation.googleapis.com/language/translate/v2"
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod rate;
pub mod translator;
pub mod types;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use config::PipelineConfig;
pub use context::{ContextScore, ContextVector};
pub use dispatch::{Callback, Dispatcher, LineSink, RunOptions, UnitSink};
pub use engine::{EngineApi, EngineError, RestEngineClient};
pub use error::{Result, TranslationError};
pub use rate::RateController;
pub use translator::{
    ContextSource, EchoTranslator, EngineOptions, EngineTranslator, EnterpriseTranslator,
    GoogleTranslator, Translator,
};
pub use types::{BackendKind, LanguagePair, Priority, RetryConfig, TranslationConfig};
