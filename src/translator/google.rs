use super::Translator;
use crate::context::ContextVector;
use crate::error::{Result, TranslationError};
use crate::rate::RateController;
use crate::types::{GoogleErrorResponse, GoogleRequest, GoogleResponse, LanguagePair, RetryConfig};
use crate::xml;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;

pub const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// 托管翻译 API 后端，所有请求都经过自适应速率控制
pub struct GoogleTranslator {
    languages: LanguagePair,
    api_key: String,
    url: String,
    client: Client,
    controller: RateController,
}

impl GoogleTranslator {
    pub const DEFAULT_CONCURRENCY: usize = 5;

    pub fn new(languages: LanguagePair, api_key: impl Into<String>) -> Self {
        Self::with_retry_config(languages, api_key, RetryConfig::default())
    }

    pub fn with_retry_config(
        languages: LanguagePair,
        api_key: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            languages,
            api_key: api_key.into(),
            url: GOOGLE_TRANSLATE_URL.to_string(),
            client: super::http_client(),
            controller: RateController::new(retry),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn rate_controller(&self) -> &RateController {
        &self.controller
    }

    async fn request(&self, form: &GoogleRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .header("X-HTTP-Method-Override", "GET")
            .form(form)
            .send()
            .await
            .map_err(|e| {
                TranslationError::Connection(format!("Unable to connect to Google Translate: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_failure(status.as_u16(), &body))
        }
    }
}

/// 语言代码只保留主标签，`zh-CN` 与 `zh-TW` 除外
pub fn normalize_language(lang: &str) -> String {
    let mut fields = lang.split('-');
    let base = fields.next().unwrap_or(lang);

    match (base, fields.next()) {
        ("zh", Some("CN")) | ("zh", Some("TW")) => lang.to_string(),
        _ => base.to_string(),
    }
}

/// 随机客户端地址，降低共享出口 IP 被限流的概率
fn random_user_ip() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| rng.gen_range(0..=200u8).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// 根据状态码与错误体把失败响应归类
pub(crate) fn classify_failure(status: u16, body: &str) -> TranslationError {
    let parsed = serde_json::from_str::<GoogleErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map(|p| p.error.message.clone())
        .unwrap_or_else(|| body.trim().to_string());

    if status == 403 {
        let reasons = parsed.iter().flat_map(|p| p.error.errors.iter());
        for error in reasons {
            match error.reason.as_str() {
                "dailyLimitExceeded" => {
                    return TranslationError::Remote(
                        "Google Translate free quota is over. Please specify your Google Translate API key."
                            .to_string(),
                    )
                }
                "userRateLimitExceeded" => {
                    return TranslationError::RateLimited(
                        "Google Translate rate limit exceeded".to_string(),
                    )
                }
                _ => {}
            }
        }
    } else if status == 429 {
        return TranslationError::RateLimited("Google Translate rate limit exceeded".to_string());
    } else if (500..600).contains(&status) {
        return TranslationError::Server {
            status,
            message: format!("Google Translate server error ({}): {}", status, message),
        };
    }

    TranslationError::Remote(format!("Google Translate error ({}): {}", status, message))
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn name(&self) -> &str {
        "Google Translate"
    }

    fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    async fn default_concurrency(&self) -> Result<usize> {
        Ok(Self::DEFAULT_CONCURRENCY)
    }

    async fn translate(&self, text: &str, _context: Option<&ContextVector>) -> Result<String> {
        let has_markup = xml::has_xml_tag(text);
        let query = if has_markup { text.to_string() } else { xml::unescape(text) };

        let form = GoogleRequest {
            model: "nmt",
            source: normalize_language(&self.languages.source),
            target: normalize_language(&self.languages.target),
            q: query,
            key: &self.api_key,
            userip: random_user_ip(),
        };

        let body = self.controller.call(|| self.request(&form)).await?;

        let response: GoogleResponse = serde_json::from_str(&body)
            .map_err(|e| TranslationError::Parse(format!("Google Translate response: {}", e)))?;
        let translation = response
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| TranslationError::Parse("Google Translate returned no translations".into()))?;

        if has_markup {
            Ok(translation)
        } else {
            Ok(xml::escape(&translation))
        }
    }
}
