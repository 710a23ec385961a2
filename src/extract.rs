//! Extraction of structured payloads from free-form model output.
//!
//! The model is asked to wrap its answer in a ```` ```json ```` fence, but it
//! regularly adds a preamble, a closing remark, or drops the fence entirely.
//! Rules, in order:
//!
//! 1. Blank input is an [`ExtractError::EmptyResponse`], never a parse error.
//! 2. If a block fenced as ```` ```json ```` exists, the first one's interior is used.
//! 3. Otherwise the whole trimmed text is used.
//! 4. The selected content is parsed as JSON. Nothing is repaired; any failure
//!    is an [`ExtractError::Parse`] carrying the attempted content.

use crate::models::NewsItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("fence pattern is valid"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("model returned no text")]
    EmptyResponse,

    #[error("JSON decode error: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        /// The content the parser was given, kept for diagnostics.
        raw: String,
    },
}

/// Interior of the first ```` ```json ```` fenced block, if any.
pub fn extract_fenced_json(text: &str) -> Option<&str> {
    JSON_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Select the JSON payload from `text` and parse it.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::EmptyResponse);
    }

    let content = extract_fenced_json(trimmed).unwrap_or(trimmed);
    serde_json::from_str(content).map_err(|source| ExtractError::Parse {
        source,
        raw: content.to_string(),
    })
}

/// Extract and decode a list of [`NewsItem`] from model output.
///
/// A payload that is valid JSON but not a list of news items (an object, an
/// item missing `sources`, ...) is reported as a parse error.
pub fn parse_news_items(text: &str) -> Result<Vec<NewsItem>, ExtractError> {
    let value = extract_json(text)?;
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|source| ExtractError::Parse { source, raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ITEMS: &str = r#"[{"title": "A", "summary": "B", "sources": [{"link_title": "C", "url": "https://c.example"}]}]"#;

    #[test]
    fn test_fenced_block_ignores_surrounding_prose() {
        let text = format!("Here are today's stories:\n```json\n{ITEMS}\n```\nLet me know if you need more.");
        let value = extract_json(&text).unwrap();
        assert_eq!(value[0]["title"], "A");
        assert_eq!(value[0]["sources"][0]["url"], "https://c.example");
    }

    #[test]
    fn test_first_fenced_block_wins() {
        let text = "```json\n[1]\n```\nand also\n```json\n[2]\n```";
        assert_eq!(extract_json(text).unwrap(), json!([1]));
    }

    #[test]
    fn test_untagged_fence_is_not_used() {
        // A plain ``` fence is not a json fence, so the whole text is parsed and fails.
        let text = "```\n[1]\n```";
        assert!(extract_fenced_json(text).is_none());
        assert!(matches!(extract_json(text), Err(ExtractError::Parse { .. })));
    }

    #[test]
    fn test_unfenced_text_is_parsed_whole() {
        let text = format!("\n\n  {ITEMS}  \n");
        let items = parse_news_items(&text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].summary, "B");
    }

    #[test]
    fn test_blank_input_is_empty_response() {
        assert!(matches!(extract_json(""), Err(ExtractError::EmptyResponse)));
        assert!(matches!(extract_json(" \n\t "), Err(ExtractError::EmptyResponse)));
        assert!(matches!(parse_news_items("   "), Err(ExtractError::EmptyResponse)));
    }

    #[test]
    fn test_malformed_json_is_parse_error_with_raw_text() {
        let text = "```json\n[{\"title\": \"A\",]\n```";
        match extract_json(text) {
            Err(ExtractError::Parse { raw, .. }) => assert_eq!(raw, "[{\"title\": \"A\",]"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_prose_without_fence_is_parse_error() {
        let text = "Sorry, I could not find any news right now.";
        assert!(matches!(extract_json(text), Err(ExtractError::Parse { .. })));
    }

    #[test]
    fn test_object_payload_is_not_a_news_list() {
        let text = "```json\n{\"title\": \"A\", \"summary\": \"B\", \"sources\": []}\n```";
        assert!(extract_json(text).unwrap().is_object());
        assert!(matches!(parse_news_items(text), Err(ExtractError::Parse { .. })));
    }

    #[test]
    fn test_empty_list_parses() {
        let items = parse_news_items("```json\n[]\n```").unwrap();
        assert!(items.is_empty());
    }
}
