//! 翻译引擎节点 API
//!
//! 集群节点对外暴露 translate / context-vector / info 三类 REST 接口。
//! `EngineApi` 把它们抽象成 trait，便于测试时替换为内存实现。

use crate::context::ContextVector;
use crate::types::{
    EngineContextVectors, EngineEnvelope, EngineInfo, EngineTranslation, Priority,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// 引擎 API 调用失败
#[derive(Debug, Error)]
pub enum EngineError {
    /// 无法连接节点
    #[error("connection error: {0}")]
    Connection(String),
    /// 节点返回的业务错误
    #[error("{cause}")]
    Api { cause: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait EngineApi: Send + Sync {
    /// 节点地址，用于错误提示
    fn endpoint(&self) -> &str;

    async fn translate(
        &self,
        source: &str,
        target: &str,
        text: &str,
        context: Option<&ContextVector>,
        priority: Priority,
    ) -> Result<EngineTranslation, EngineError>;

    /// 由节点读取本地文件并计算上下文向量
    async fn context_from_file(
        &self,
        source: &str,
        target: &str,
        path: &Path,
    ) -> Result<ContextVector, EngineError>;

    async fn context_from_text(
        &self,
        source: &str,
        target: &str,
        text: &str,
    ) -> Result<ContextVector, EngineError>;

    async fn info(&self) -> Result<EngineInfo, EngineError>;
}

/// 基于 reqwest 的 REST 客户端
#[derive(Clone)]
pub struct RestEngineClient {
    base_url: String,
    client: Client,
}

impl RestEngineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: crate::translator::http_client(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "engine request");

        let response = self
            .client
            .post(&url)
            .header("X-HTTP-Method-Override", "GET")
            .form(params)
            .send()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let envelope: EngineEnvelope<T> = serde_json::from_str(&body).map_err(|_| EngineError::Api {
            cause: format!("unexpected response ({}): {}", status, body.trim()),
        })?;

        if let Some(error) = envelope.error {
            let cause = if error.kind.is_empty() {
                error.message
            } else {
                format!("({}) {}", error.kind, error.message)
            };
            return Err(EngineError::Api { cause });
        }

        envelope.data.ok_or_else(|| EngineError::Api {
            cause: format!("empty response with status {}", envelope.status),
        })
    }

    fn pick_vector(
        vectors: EngineContextVectors,
        target: &str,
    ) -> Result<ContextVector, EngineError> {
        match vectors.vectors.get(target) {
            Some(encoded) if !encoded.trim().is_empty() => {
                encoded.parse().map_err(|e: crate::TranslationError| EngineError::Api {
                    cause: e.to_string(),
                })
            }
            _ => Ok(ContextVector::default()),
        }
    }
}

#[async_trait]
impl EngineApi for RestEngineClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn translate(
        &self,
        source: &str,
        target: &str,
        text: &str,
        context: Option<&ContextVector>,
        priority: Priority,
    ) -> Result<EngineTranslation, EngineError> {
        let mut params = vec![
            ("source", source.to_string()),
            ("target", target.to_string()),
            ("q", text.to_string()),
            ("priority", priority.as_str().to_string()),
        ];
        if let Some(context) = context {
            params.push(("context_vector", context.to_string()));
        }

        self.call("/translate", &params).await
    }

    async fn context_from_file(
        &self,
        source: &str,
        target: &str,
        path: &Path,
    ) -> Result<ContextVector, EngineError> {
        let path = tokio::fs::canonicalize(path).await?;
        let params = [
            ("source", source.to_string()),
            ("targets", target.to_string()),
            ("local_file", path.to_string_lossy().into_owned()),
        ];

        let vectors = self.call("/context-vector", &params).await?;
        Self::pick_vector(vectors, target)
    }

    async fn context_from_text(
        &self,
        source: &str,
        target: &str,
        text: &str,
    ) -> Result<ContextVector, EngineError> {
        let params = [
            ("source", source.to_string()),
            ("targets", target.to_string()),
            ("text", text.to_string()),
        ];

        let vectors = self.call("/context-vector", &params).await?;
        Self::pick_vector(vectors, target)
    }

    async fn info(&self) -> Result<EngineInfo, EngineError> {
        self.call("/", &[]).await
    }
}

/// 本机可用的 GPU 数量，`nvidia-smi` 不可用时返回 0
pub async fn count_accelerators() -> usize {
    let output = match Command::new("nvidia-smi").arg("--list-gpus").output().await {
        Ok(output) if output.status.success() => output,
        _ => return 0,
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| line.starts_with("GPU "))
        .count()
}
