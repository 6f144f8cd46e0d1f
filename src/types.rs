//! 类型定义模块
//!
//! 定义翻译管道中使用的配置类型与各远端 API 的请求/响应结构。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 源语言与目标语言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.source, self.target)
    }
}

/// 远端节点上的排队优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Background,
    Normal,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Background => "background",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Echo,
    Engine,
    Google,
    Enterprise,
}

/// 翻译配置
///
/// # 字段说明
///
/// * `backend` - 使用的翻译后端
/// * `source_lang` - 源语言代码
/// * `target_lang` - 目标语言代码
/// * `threads` - 并发数，未设置时使用后端默认值
/// * `best_effort` - 单条失败时输出空行并继续，而不是中止整个批次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// 使用的翻译后端
    #[serde(default)]
    pub backend: BackendKind,
    /// 源语言代码
    pub source_lang: String,
    /// 目标语言代码
    pub target_lang: String,
    /// 并发数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// 容错模式
    #[serde(default)]
    pub best_effort: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Echo,
            source_lang: "en".to_string(),
            target_lang: "it".to_string(),
            threads: None,
            best_effort: false,
        }
    }
}

/// 自适应延迟与服务端错误重试参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 服务端错误的最大尝试次数
    pub max_server_errors: usize,
    /// 服务端错误的固定重试间隔
    pub server_retry_interval_ms: u64,
    /// 低于该值的延迟视为 0（秒）
    pub min_delay: f64,
    /// 首次限流后的延迟（秒）
    pub initial_delay: f64,
    /// 限流时的增长倍数
    pub growth: f64,
    /// 成功时的衰减倍数
    pub decay: f64,
    /// 延迟上限（秒）
    pub max_delay: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_server_errors: 10,
            server_retry_interval_ms: 1000,
            min_delay: 0.002,
            initial_delay: 0.05,
            growth: 1.05,
            decay: 0.95,
            max_delay: 1.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoogleRequest<'a> {
    pub model: &'a str,
    pub source: String,
    pub target: String,
    pub q: String,
    pub key: &'a str,
    pub userip: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleResponse {
    pub data: GoogleData,
}

#[derive(Debug, Deserialize)]
pub struct GoogleData {
    #[serde(default)]
    pub translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub errors: Vec<GoogleErrorReason>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorReason {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct EnterpriseRequest<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub q: &'a str,
    pub priority: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_vector: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnterpriseResponse {
    pub data: EnterpriseData,
}

#[derive(Debug, Deserialize)]
pub struct EnterpriseData {
    pub translation: String,
}

#[derive(Debug, Deserialize)]
pub struct EnterpriseErrorResponse {
    pub error: EnterpriseErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct EnterpriseErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// 引擎节点的统一响应外壳
#[derive(Debug, Deserialize)]
pub struct EngineEnvelope<T> {
    #[serde(default)]
    pub status: u16,
    pub data: Option<T>,
    pub error: Option<EngineErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct EngineErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineTranslation {
    pub translation: String,
}

#[derive(Debug, Deserialize)]
pub struct EngineContextVectors {
    #[serde(default)]
    pub vectors: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineInfo {
    #[serde(default)]
    pub cluster: ClusterInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterInfo {
    #[serde(default)]
    pub nodes: Vec<serde_json::Value>,
}
