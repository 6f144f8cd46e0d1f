use super::Translator;
use crate::context::ContextVector;
use crate::error::Result;
use crate::types::LanguagePair;
use async_trait::async_trait;

/// 原样返回输入，用于检验管道本身
#[derive(Debug, Clone)]
pub struct EchoTranslator {
    languages: LanguagePair,
}

impl EchoTranslator {
    pub const DEFAULT_CONCURRENCY: usize = 16;

    pub fn new(languages: LanguagePair) -> Self {
        Self { languages }
    }
}

#[async_trait]
impl Translator for EchoTranslator {
    fn name(&self) -> &str {
        "Echo Translate"
    }

    fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    async fn default_concurrency(&self) -> Result<usize> {
        Ok(Self::DEFAULT_CONCURRENCY)
    }

    async fn translate(&self, text: &str, _context: Option<&ContextVector>) -> Result<String> {
        Ok(text.to_string())
    }
}
