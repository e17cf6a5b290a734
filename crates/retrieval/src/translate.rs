//! Query translation for the secondary retrieval pass.

use crate::config::{TranslationConfig, TranslationProvider};
use crate::types::Language;
use lingua_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Output of one translation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedQuery {
    pub text: String,
    /// Source language reported by the provider, when it detects one
    pub source_language: Option<Language>,
}

/// Translates a query into the secondary retrieval language.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Language every translation is produced in.
    fn target(&self) -> &Language;

    async fn translate(&self, text: &str) -> AppResult<TranslatedQuery>;
}

/// Build the configured translator, or `None` when translation is disabled.
pub fn create_translator(config: &TranslationConfig) -> AppResult<Option<Arc<dyn Translator>>> {
    match config.provider {
        TranslationProvider::None => Ok(None),
        TranslationProvider::Google => Ok(Some(Arc::new(GoogleTranslator::new(config)?))),
    }
}

/// Google Cloud Translation (v2 REST, API key auth).
pub struct GoogleTranslator {
    client: Client,
    url: String,
    api_key_env: String,
    target: Language,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<TranslatedText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedText {
    translated_text: String,
    #[serde(default)]
    detected_source_language: Option<String>,
}

impl GoogleTranslator {
    pub fn new(config: &TranslationConfig) -> AppResult<Self> {
        let target = config
            .target_language
            .parse::<Language>()
            .map_err(|e| AppError::Config(format!("translation.target_language: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config
                .endpoint
                .clone()
                .unwrap_or_else(|| GOOGLE_TRANSLATE_URL.to_string()),
            api_key_env: config.api_key_env.clone(),
            target,
        })
    }
}

#[async_trait::async_trait]
impl Translator for GoogleTranslator {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn target(&self) -> &Language {
        &self.target
    }

    #[instrument(skip(self, text), fields(target = %self.target))]
    async fn translate(&self, text: &str) -> AppResult<TranslatedQuery> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            AppError::Translation(format!(
                "API key not found in environment variable {}",
                self.api_key_env
            ))
        })?;

        let request = TranslateRequest {
            q: text,
            target: self.target.code(),
            format: "text",
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Translation(format!("Translation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::Translation(format!(
                "Translation API returned {}: {}",
                status, body
            )));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Translation(format!("Invalid translation response: {}", e)))?;

        let translated = first_translation(body)?;
        debug!(
            "Translated query ({} chars, detected source {:?})",
            translated.text.chars().count(),
            translated.source_language
        );
        Ok(translated)
    }
}

fn first_translation(body: TranslateResponse) -> AppResult<TranslatedQuery> {
    let first = body
        .data
        .translations
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Translation("Translation response was empty".to_string()))?;

    Ok(TranslatedQuery {
        text: first.translated_text,
        source_language: first
            .detected_source_language
            .and_then(|code| code.parse().ok()),
    })
}

/// Fixed-table translator for tests and offline runs.
///
/// Unknown inputs fail, which exercises the degraded single-pass path.
pub struct StaticTranslator {
    target: Language,
    source: Option<Language>,
    table: Vec<(String, String)>,
}

impl StaticTranslator {
    pub fn new(target: Language) -> Self {
        Self {
            target,
            source: None,
            table: Vec::new(),
        }
    }

    /// Report `source` as the detected language of every input.
    pub fn with_source_language(mut self, source: Language) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with(mut self, source: impl Into<String>, translated: impl Into<String>) -> Self {
        self.table.push((source.into(), translated.into()));
        self
    }
}

#[async_trait::async_trait]
impl Translator for StaticTranslator {
    fn provider_name(&self) -> &str {
        "static"
    }

    fn target(&self) -> &Language {
        &self.target
    }

    async fn translate(&self, text: &str) -> AppResult<TranslatedQuery> {
        self.table
            .iter()
            .find(|(source, _)| source == text)
            .map(|(_, translated)| TranslatedQuery {
                text: translated.clone(),
                source_language: self.source.clone(),
            })
            .ok_or_else(|| AppError::Translation(format!("No translation for '{}'", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(TranslateRequest {
            q: "經痛怎麼辦",
            target: "en",
            format: "text",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"q": "經痛怎麼辦", "target": "en", "format": "text"})
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"data": {"translations": [{"translatedText": "What to do about cramps", "detectedSourceLanguage": "zh-TW"}]}}"#;
        let body: TranslateResponse = serde_json::from_str(raw).unwrap();
        let translated = first_translation(body).unwrap();
        assert_eq!(translated.text, "What to do about cramps");
        assert_eq!(translated.source_language, Some(Language::Chinese));

        let undetected: TranslateResponse = serde_json::from_str(
            r#"{"data": {"translations": [{"translatedText": "cramps"}]}}"#,
        )
        .unwrap();
        assert_eq!(first_translation(undetected).unwrap().source_language, None);

        let empty: TranslateResponse =
            serde_json::from_str(r#"{"data": {"translations": []}}"#).unwrap();
        assert!(matches!(
            first_translation(empty),
            Err(AppError::Translation(_))
        ));
    }

    #[test]
    fn test_factory() {
        let disabled = TranslationConfig {
            provider: TranslationProvider::None,
            ..Default::default()
        };
        assert!(create_translator(&disabled).unwrap().is_none());

        let google = create_translator(&TranslationConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(google.provider_name(), "google");
        assert_eq!(google.target(), &Language::English);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_translation_error() {
        let config = TranslationConfig {
            api_key_env: "LINGUA_TEST_UNSET_TRANSLATE_KEY".to_string(),
            ..Default::default()
        };
        let translator = GoogleTranslator::new(&config).unwrap();
        let err = translator.translate("你好").await.unwrap_err();
        assert!(matches!(err, AppError::Translation(_)));
    }

    #[tokio::test]
    async fn test_static_translator() {
        let translator = StaticTranslator::new(Language::English).with("月經", "menstruation");
        let translated = translator.translate("月經").await.unwrap();
        assert_eq!(translated.text, "menstruation");
        assert_eq!(translated.source_language, None);
        assert!(translator.translate("其他").await.is_err());

        let korean = StaticTranslator::new(Language::English)
            .with_source_language(Language::Other("ko".to_string()))
            .with("생리통", "period cramps");
        assert_eq!(
            korean.translate("생리통").await.unwrap().source_language,
            Some(Language::Other("ko".to_string()))
        );
    }
}
