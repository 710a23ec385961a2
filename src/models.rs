//! Data models for curated news items and the records built from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`] and [`Source`]: one news story as returned by the model
//! - [`StoredRecord`]: the document written to the store per (country, language)
//! - [`FetchOutcome`], [`CountryReport`], [`RunSummary`]: in-memory results of a
//!   batch run, logged and printed but never persisted
//!
//! Field names are snake_case on the wire, matching the JSON shape the model is
//! instructed to produce and the shape the translation endpoint accepts.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A source backing a news item.
///
/// `url` is carried verbatim everywhere; only `link_title` is ever translated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Source {
    /// Human-readable title of the linked article.
    pub link_title: String,
    /// Link to the original article.
    pub url: String,
}

/// A single curated news story.
///
/// Produced only by parsing the model's response (or by translating an
/// existing item); never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    /// The headline.
    pub title: String,
    /// A concise summary of the story.
    pub summary: String,
    /// Primary sources, in the order the model listed them.
    pub sources: Vec<Source>,
}

/// The document written to the store for one (country, language) run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StoredRecord {
    pub country: String,
    pub language: String,
    /// RFC 3339 UTC timestamp of when the record was built.
    pub timestamp: String,
    pub news_data: Vec<NewsItem>,
}

impl StoredRecord {
    /// Build a record stamped with the current UTC time.
    pub fn new(country: &str, language: &str, news_data: Vec<NewsItem>) -> Self {
        Self {
            country: country.to_string(),
            language: language.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            news_data,
        }
    }
}

/// Outcome of fetching and storing news for one language.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
    Success { doc_id: String, items_count: usize },
    Error { message: String },
}

impl FetchOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        FetchOutcome::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Per-language outcomes for one country.
///
/// `aborted` is set when a non-retryable backend failure stopped the
/// remaining languages from being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountryReport {
    pub country: String,
    pub outcomes: BTreeMap<String, FetchOutcome>,
    pub aborted: bool,
}

impl CountryReport {
    pub fn new(country: &str) -> Self {
        Self {
            country: country.to_string(),
            ..Default::default()
        }
    }

    pub fn successes(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }
}

/// Results of a whole batch run, one report per country in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub countries: Vec<CountryReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_news_item_deserialization() {
        let json = r#"{
            "title": "Budget passes",
            "summary": "Parliament approved the budget.",
            "sources": [{"link_title": "Reuters", "url": "https://reuters.com/a"}]
        }"#;

        let item: NewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.title, "Budget passes");
        assert_eq!(item.sources.len(), 1);
        assert_eq!(item.sources[0].url, "https://reuters.com/a");
    }

    #[test]
    fn test_news_item_requires_sources() {
        let json = r#"{"title": "T", "summary": "S"}"#;
        assert!(serde_json::from_str::<NewsItem>(json).is_err());
    }

    #[test]
    fn test_stored_record_timestamp_is_utc_rfc3339() {
        let record = StoredRecord::new("Japan", "Japanese", vec![]);
        let parsed = DateTime::parse_from_rfc3339(&record.timestamp).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert_eq!(record.country, "Japan");
        assert_eq!(record.language, "Japanese");
    }

    #[test]
    fn test_fetch_outcome_serialization() {
        let ok = FetchOutcome::Success {
            doc_id: "abc".to_string(),
            items_count: 3,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["doc_id"], "abc");
        assert_eq!(json["items_count"], 3);

        let err = FetchOutcome::error("boom");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn test_country_report_successes() {
        let mut report = CountryReport::new("Spain");
        report.outcomes.insert(
            "Spanish".to_string(),
            FetchOutcome::Success {
                doc_id: "1".to_string(),
                items_count: 10,
            },
        );
        report
            .outcomes
            .insert("English".to_string(), FetchOutcome::error("no text"));
        assert_eq!(report.successes(), 1);
        assert!(!report.aborted);
    }
}
