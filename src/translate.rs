//! Translation of stored news items into another language.
//!
//! Items are translated one field at a time through the Google Cloud
//! Translation v2 API. Titles, summaries and source link titles are
//! translated; URLs are passed through untouched and empty strings are never
//! sent to the backend. The source language is fixed for the process.

use crate::models::{NewsItem, Source};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

/// Language the stored corpus is written in.
pub const DEFAULT_SOURCE_LANGUAGE: &str = "en";

/// Default Translation API endpoint.
pub const TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("translation response contained no translations")]
    EmptyResult,

    #[error("invalid translation URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A single-string translation backend.
///
/// The returned future is `Send` so translations can run inside the HTTP
/// server's handlers.
pub trait Translate {
    fn translate(
        &self,
        text: &str,
        target: &str,
        source: &str,
    ) -> impl Future<Output = Result<String, TranslateError>> + Send;
}

/// Body accepted by the translation endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub news_items: Vec<NewsItem>,
    #[serde(default)]
    pub target_language: String,
}

impl TranslateRequest {
    /// Both a non-empty item list and a non-blank target language are required.
    pub fn is_complete(&self) -> bool {
        !self.news_items.is_empty() && !self.target_language.trim().is_empty()
    }
}

/// Google Cloud Translation v2 client authenticated with an API key.
#[derive(Clone)]
pub struct GoogleTranslator {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for GoogleTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleTranslator")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleTranslator {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, TranslateError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            endpoint: Url::parse(TRANSLATE_URL)?,
            api_key,
        })
    }
}

impl Translate for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        target: &str,
        source: &str,
    ) -> Result<String, TranslateError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "q": text, "target": target, "source": source, "format": "text" }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let parsed: TranslateResponse = resp.json().await?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslateError::EmptyResult)
    }
}

async fn translate_field<T: Translate>(
    translator: &T,
    text: &str,
    target: &str,
    source: &str,
) -> Result<String, TranslateError> {
    if text.is_empty() {
        return Ok(String::new());
    }
    translator.translate(text, target, source).await
}

/// Translate every item, preserving item and source order.
///
/// The first backend failure aborts the whole batch; no partial result is
/// returned.
#[instrument(level = "info", skip_all, fields(items = items.len(), %target, %source))]
pub async fn translate_items<T: Translate>(
    translator: &T,
    items: &[NewsItem],
    target: &str,
    source: &str,
) -> Result<Vec<NewsItem>, TranslateError> {
    let mut translated = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        let title = translate_field(translator, &item.title, target, source).await?;
        let summary = translate_field(translator, &item.summary, target, source).await?;

        let mut sources = Vec::with_capacity(item.sources.len());
        for s in &item.sources {
            sources.push(Source {
                link_title: translate_field(translator, &s.link_title, target, source).await?,
                url: s.url.clone(),
            });
        }

        debug!(index = i, sources = sources.len(), "Translated item");
        translated.push(NewsItem {
            title,
            summary,
            sources,
        });
    }

    info!(count = translated.len(), "Translated news items");
    Ok(translated)
}


#[cfg(test)]
mod tests {
    use super::testing::UppercaseTranslator;
    use super::*;

    fn item(title: &str, summary: &str, sources: &[(&str, &str)]) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            summary: summary.to_string(),
            sources: sources
                .iter()
                .map(|(t, u)| Source {
                    link_title: t.to_string(),
                    url: u.to_string(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_translate_items_skips_empty_and_keeps_urls() {
        let translator = UppercaseTranslator::default();
        let items = vec![item("Hello", "", &[("X", "http://a")])];

        let out = translate_items(&translator, &items, "es", "en").await.unwrap();
        assert_eq!(out, vec![item("HELLO", "", &[("X", "http://a")])]);
        // title and link title only; the empty summary is never sent
        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn test_translate_items_preserves_order() {
        let translator = UppercaseTranslator::default();
        let items = vec![
            item("first", "one", &[("a", "http://a"), ("", "http://b"), ("c", "http://c")]),
            item("second", "two", &[]),
        ];

        let out = translate_items(&translator, &items, "fr", "en").await.unwrap();
        assert_eq!(out[0].title, "FIRST");
        assert_eq!(out[1].title, "SECOND");
        let links: Vec<_> = out[0].sources.iter().map(|s| (s.link_title.as_str(), s.url.as_str())).collect();
        assert_eq!(links, vec![("A", "http://a"), ("", "http://b"), ("C", "http://c")]);
    }

    #[tokio::test]
    async fn test_translate_items_aborts_on_first_failure() {
        let translator = UppercaseTranslator {
            fail_on: Some("boom".to_string()),
            ..Default::default()
        };
        let items = vec![item("ok", "boom", &[]), item("never", "reached", &[])];

        let err = translate_items(&translator, &items, "de", "en").await.unwrap_err();
        assert!(matches!(err, TranslateError::Api { status: 403, .. }));
        assert_eq!(translator.calls(), 2);
    }

    #[test]
    fn test_translate_request_completeness() {
        let req: TranslateRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.is_complete());

        let req: TranslateRequest =
            serde_json::from_str(r#"{"news_items": [], "target_language": "es"}"#).unwrap();
        assert!(!req.is_complete());

        let req: TranslateRequest = serde_json::from_str(
            r#"{"news_items": [{"title": "t", "summary": "s", "sources": []}], "target_language": " "}"#,
        )
        .unwrap();
        assert!(!req.is_complete());

        let req: TranslateRequest = serde_json::from_str(
            r#"{"news_items": [{"title": "t", "summary": "s", "sources": []}], "target_language": "es"}"#,
        )
        .unwrap();
        assert!(req.is_complete());
    }

    #[test]
    fn test_translate_response_parsing() {
        let json = r#"{"data": {"translations": [{"translatedText": "Hola"}]}}"#;
        let parsed: TranslateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.translations[0].translated_text, "Hola");
    }
}
