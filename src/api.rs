//! Generative backend interaction with exponential backoff retry logic.
//!
//! This module provides the interface to the Gemini `generateContent` API and
//! a retry decorator that tolerates transient failures.
//!
//! # Architecture
//!
//! - [`Generate`]: core trait defining one async generation call
//! - [`GeminiClient`]: REST client for the Gemini API with search grounding
//! - [`MockGenerator`]: canned response for offline runs, chosen explicitly by the caller
//! - [`Generator`]: enum dispatch over the two
//! - [`RetryGenerate`]: decorator that adds the retry policy to any [`Generate`]
//!
//! # Retry Strategy
//!
//! - At most 5 attempts
//! - Exponential backoff starting at 5 seconds, doubling after each failure
//! - No jitter and no cap
//! - Retries on 500/503 (`INTERNAL`/`UNAVAILABLE`) and on responses without text
//! - Any other failure is fatal and returned after a single call

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API root.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

/// One generation call: the model, the user prompt, the system instruction,
/// and whether search grounding is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub system_instruction: String,
    pub grounding: bool,
}

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{status} {code}: {message}")]
    Unavailable {
        status: u16,
        code: String,
        message: String,
    },

    #[error("{status} {code}: {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl BackendError {
    /// Classify a non-success HTTP response from a Google API.
    ///
    /// 500/503 or a Google status of `INTERNAL`/`UNAVAILABLE` is transient;
    /// everything else (auth, invalid argument, quota) is a rejection.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.status, envelope.error.message),
            Err(_) => (
                status.canonical_reason().unwrap_or("UNKNOWN").to_string(),
                body.trim().to_string(),
            ),
        };

        let transient = matches!(
            status,
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE
        ) || matches!(code.as_str(), "UNAVAILABLE" | "INTERNAL");

        if transient {
            BackendError::Unavailable {
                status: status.as_u16(),
                code,
                message,
            }
        } else {
            BackendError::Rejected {
                status: status.as_u16(),
                code,
                message,
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. })
    }
}

/// Trait for one generative call.
///
/// An `Ok` with an empty string means the backend answered without text.
pub trait Generate {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError>;
}

/// REST client for the Gemini `generateContent` endpoint.
///
/// The HTTP client has no request timeout; grounded generations can take a
/// long time and are bounded by the transport only.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: Url,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            api_key,
            base_url,
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("v1beta/models/{model}:generateContent"))
    }
}

/// Request body for `generateContent`.
fn request_body(request: &GenerationRequest) -> serde_json::Value {
    let mut body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
    });
    if request.grounding {
        body["tools"] = json!([{ "google_search": {} }]);
    }
    body
}

impl Generate for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        let t0 = Instant::now();
        let endpoint = self
            .endpoint(&request.model)
            .map_err(|e| BackendError::Rejected {
                status: 0,
                code: "INVALID_ARGUMENT".to_string(),
                message: format!("invalid model endpoint: {e}"),
            })?;

        let resp = self
            .http
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        let dt = t0.elapsed();

        if !status.is_success() {
            let e = BackendError::from_response(status, &body);
            warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "generateContent failed");
            return Err(e);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        let text = parsed.text();
        info!(elapsed_ms = dt.as_millis() as u64, bytes = text.len(), "generateContent returned");
        Ok(text)
    }
}

/// Canned response used when running without a real backend.
pub const MOCK_RESPONSE: &str = r#"[{"title": "Mock News Title", "summary": "This is a mock summary.", "sources": [{"link_title": "Mock Source", "url": "http://mock.com"}]}]"#;

/// Generator that always returns [`MOCK_RESPONSE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MockGenerator;

impl Generate for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        warn!(model = %request.model, "MOCK: returning dummy data instead of calling the backend");
        Ok(MOCK_RESPONSE.to_string())
    }
}

/// The generator selected at startup.
#[derive(Debug)]
pub enum Generator {
    Gemini(GeminiClient),
    Mock(MockGenerator),
}

impl Generate for Generator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        match self {
            Generator::Gemini(client) => client.generate(request).await,
            Generator::Mock(mock) => mock.generate(request).await,
        }
    }
}

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls allowed, including the first.
    pub max_attempts: usize,
    /// Wait after the first failed attempt; doubles after each further failure.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as u32;
        self.initial_delay.saturating_mul(1u32 << exp)
    }
}

/// Terminal result of a retried call.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed transiently or returned no text.
    #[error("no response after {attempts} attempts: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    /// A non-retryable failure; the caller must stop its batch.
    #[error(transparent)]
    Fatal(BackendError),
}

impl RetryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RetryError::Fatal(_))
    }
}

/// Wrapper that adds the [`RetryPolicy`] to any [`Generate`] implementation.
pub struct RetryGenerate<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> fmt::Debug for RetryGenerate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryGenerate")
            .field("max_attempts", &self.policy.max_attempts)
            .field("initial_delay", &self.policy.initial_delay)
            .finish()
    }
}

impl<T> RetryGenerate<T>
where
    T: Generate,
{
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Call the backend until it returns non-blank text, the policy is
    /// exhausted, or a non-retryable error occurs.
    #[instrument(level = "info", skip_all)]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, RetryError> {
        let total_t0 = Instant::now();
        let max = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max {
            let attempt_t0 = Instant::now();
            let failure = match self.inner.generate(request).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "generate succeeded"
                    );
                    return Ok(text);
                }
                Ok(_) => "model returned no text".to_string(),
                Err(e) if e.is_retryable() => e.to_string(),
                Err(e) => {
                    error!(attempt, max, error = %e, "generate failed with a non-retryable error");
                    return Err(RetryError::Fatal(e));
                }
            };

            if attempt < max {
                let delay = self.policy.delay_for(attempt);
                warn!(
                    attempt,
                    max,
                    elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    ?delay,
                    error = %failure,
                    "generate attempt failed; backing off"
                );
                sleep(delay).await;
            }
            last_error = failure;
        }

        error!(
            max,
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            error = %last_error,
            "generate exhausted retries"
        );
        Err(RetryError::Exhausted {
            attempts: max,
            last_error,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            model: DEFAULT_MODEL.to_string(),
            prompt: "What happened today?".to_string(),
            system_instruction: "Answer in JSON.".to_string(),
            grounding: true,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=4).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![5, 10, 20, 40]);
    }

    #[test]
    fn test_from_response_classification() {
        let body = r#"{"error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}}"#;
        let e = BackendError::from_response(StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(e.is_retryable());
        assert_eq!(e.to_string(), "503 UNAVAILABLE: overloaded");

        let e = BackendError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(e.is_retryable());

        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let e = BackendError::from_response(StatusCode::BAD_REQUEST, body);
        assert!(!e.is_retryable());

        let e = BackendError::from_response(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_request_body_grounding() {
        let body = request_body(&request());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "What happened today?");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Answer in JSON.");
        assert!(body["tools"][0]["google_search"].is_object());

        let mut ungrounded = request();
        ungrounded.grounding = false;
        assert!(request_body(&ungrounded).get("tools").is_none());
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "```json\n"}, {"text": "[]\n```"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.text(), "```json\n[]\n```");

        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new("key".to_string(), "https://example.test/api").unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash").unwrap().as_str(),
            "https://example.test/api/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let k = 3;
        let mut script: Vec<_> = (0..k).map(|_| Err(unavailable())).collect();
        script.push(Ok("[]".to_string()));
        let api = RetryGenerate::new(ScriptedGenerator::new(script), fast_policy());

        let text = api.generate(&request()).await.unwrap();
        assert_eq!(text, "[]");
        assert_eq!(api.inner().calls(), k + 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_retried() {
        let script = vec![Ok(String::new()), Ok("  \n".to_string()), Ok("[1]".to_string())];
        let api = RetryGenerate::new(ScriptedGenerator::new(script), fast_policy());

        assert_eq!(api.generate(&request()).await.unwrap(), "[1]");
        assert_eq!(api.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_makes_exactly_max_attempts() {
        let api = RetryGenerate::new(ScriptedGenerator::new(vec![]), fast_policy());

        let err = api.generate(&request()).await.unwrap_err();
        assert!(!err.is_fatal());
        match err {
            RetryError::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("UNAVAILABLE"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(api.inner().calls(), 5);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_after_one_call() {
        let script = vec![Err(unauthenticated()), Ok("[]".to_string())];
        let api = RetryGenerate::new(ScriptedGenerator::new(script), fast_policy());

        let err = api.generate(&request()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(api.inner().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts_only() {
        let script = vec![Err(unavailable()), Err(unavailable()), Ok("[]".to_string())];
        let api = RetryGenerate::new(ScriptedGenerator::new(script), RetryPolicy::default());

        let t0 = tokio::time::Instant::now();
        api.generate(&request()).await.unwrap();
        let waited = t0.elapsed();
        assert!(waited >= Duration::from_secs(15));
        assert!(waited < Duration::from_secs(16));

        let exhausted = RetryGenerate::new(ScriptedGenerator::new(vec![]), RetryPolicy::default());
        let t0 = tokio::time::Instant::now();
        exhausted.generate(&request()).await.unwrap_err();
        // 5 + 10 + 20 + 40, no sleep after the final attempt
        let waited = t0.elapsed();
        assert!(waited >= Duration::from_secs(75));
        assert!(waited < Duration::from_secs(76));
    }

    #[tokio::test]
    async fn test_mock_generator_returns_parseable_items() {
        let text = MockGenerator.generate(&request()).await.unwrap();
        let items = crate::extract::parse_news_items(&text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Mock News Title");
    }
}
