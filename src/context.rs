//! 上下文向量
//!
//! 描述翻译领域偏好的 `(memory, score)` 列表。构造后不可变，
//! 可以在并发任务之间安全共享。

use crate::error::{Result, TranslationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 单个记忆库及其权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextScore {
    pub memory: i64,
    pub score: f64,
}

/// 上下文向量
///
/// 文本编码格式为 `id:score,id:score,...`。
///
/// ```rust
/// use ordered_translator::ContextVector;
///
/// let context: ContextVector = "4:0.5,9:0.25".parse().unwrap();
/// assert_eq!(context.len(), 2);
/// assert_eq!(context.to_string(), "4:0.5,9:0.25");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextVector {
    scores: Vec<ContextScore>,
}

impl ContextVector {
    pub fn new(scores: Vec<ContextScore>) -> Self {
        Self { scores }
    }

    pub fn scores(&self) -> &[ContextScore] {
        &self.scores
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextScore> {
        self.scores.iter()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// 解析文本编码，失败时返回包含原始文本的错误
    pub fn parse_weights(text: &str) -> Result<Self> {
        let invalid = || TranslationError::InvalidContext(text.to_string());
        let mut scores = Vec::new();

        for entry in text.split(',') {
            let mut fields = entry.split(':');
            let (id, score) = match (fields.next(), fields.next(), fields.next()) {
                (Some(id), Some(score), None) => (id.trim(), score.trim()),
                _ => return Err(invalid()),
            };

            scores.push(ContextScore {
                memory: id.parse().map_err(|_| invalid())?,
                score: score.parse().map_err(|_| invalid())?,
            });
        }

        Ok(Self { scores })
    }
}

impl FromStr for ContextVector {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_weights(s)
    }
}

impl fmt::Display for ContextVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.scores.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", entry.memory, entry.score)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ContextVector {
    type Item = &'a ContextScore;
    type IntoIter = std::slice::Iter<'a, ContextScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weight_pairs() {
        let context: ContextVector = "4:0.5,9:0.25".parse().unwrap();
        assert_eq!(
            context.scores(),
            &[
                ContextScore { memory: 4, score: 0.5 },
                ContextScore { memory: 9, score: 0.25 },
            ]
        );
    }

    #[test]
    fn encoding_reproduces_pairs() {
        let context: ContextVector = " 12 : 1 ,3:0.125".parse().unwrap();
        let reparsed: ContextVector = context.to_string().parse().unwrap();
        assert_eq!(context, reparsed);
        assert_eq!(context.to_string(), "12:1,3:0.125");
    }

    #[test]
    fn rejects_malformed_text() {
        for text in ["4-0.5", "", "4:0.5,", "a:0.5", "4:x", "4:0.5:1"] {
            let err = text.parse::<ContextVector>().unwrap_err();
            assert!(
                matches!(err, TranslationError::InvalidContext(ref raw) if raw == text),
                "unexpected error for {:?}: {}",
                text,
                err
            );
        }
    }

    #[test]
    fn serializes_as_plain_list() {
        let context: ContextVector = "1:0.75".parse().unwrap();
        let json = serde_json::to_string(&context).unwrap();
        assert_eq!(json, r#"[{"memory":1,"score":0.75}]"#);
    }
}
