//! 错误处理模块
//!
//! 定义翻译管道中使用的错误类型，并区分连接错误、远端逻辑错误、
//! 限流信号与可重试的服务端错误。

use thiserror::Error;

/// 翻译错误类型
///
/// # 变体说明
///
/// * `Connection` - 无法连接远端服务
/// * `Remote` - 远端服务返回了业务错误（例如不支持的语言对）
/// * `RateLimited` - 限流信号，由速率控制器内部吸收
/// * `Server` - 5xx 服务端错误，有限次重试后才会上抛
/// * `InvalidContext` - 上下文向量文本格式错误
#[derive(Debug, Error)]
pub enum TranslationError {
    /// 连接错误
    #[error("{0}")]
    Connection(String),
    /// 远端逻辑错误
    #[error("{0}")]
    Remote(String),
    /// 限流信号
    #[error("Rate limit error: {0}")]
    RateLimited(String),
    /// 服务端错误
    #[error("{message}")]
    Server {
        /// HTTP 状态码
        status: u16,
        /// 错误消息
        message: String,
    },
    /// 上下文向量解析错误
    #[error("invalid context weights map: {0}")]
    InvalidContext(String),
    /// 解析错误
    #[error("Parse error: {0}")]
    Parse(String),
    /// HTTP请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 文件读写错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
    /// 工作任务异常退出
    #[error("worker task failed: {0}")]
    Worker(String),
    /// 自定义错误消息
    #[error("{0}")]
    Custom(String),
}

impl TranslationError {
    /// 是否为限流信号
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, TranslationError::RateLimited(_))
    }

    /// 是否可以在固定间隔后重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranslationError::Server { .. })
    }
}

impl From<String> for TranslationError {
    fn from(error: String) -> Self {
        TranslationError::Custom(error)
    }
}

impl From<&str> for TranslationError {
    fn from(error: &str) -> Self {
        TranslationError::Custom(error.to_string())
    }
}

/// 翻译结果类型别名
///
/// # 示例
///
/// ```rust
/// use ordered_translator::{Result, TranslationError};
///
/// fn example_function() -> Result<String> {
///     Err(TranslationError::Remote("unsupported language pair".to_string()))
/// }
///
/// assert!(example_function().is_err());
/// ```
pub type Result<T> = std::result::Result<T, TranslationError>;
