//! HTTP front end for on-demand translation.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/`, `/translate` | Translate `news_items` into `target_language` |
//! | `OPTIONS` | `/`, `/translate` | CORS preflight, 204 |
//! | `GET` | `/health` | Liveness probe |
//!
//! Every response carries `Access-Control-Allow-Origin: *`. Errors are JSON
//! bodies of the form `{"error": "..."}`: 400 for malformed requests (no
//! backend call is made) and 500 for anything that fails afterwards, panics
//! included.

use crate::models::NewsItem;
use crate::translate::{Translate, TranslateRequest, translate_items};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const NO_JSON: &str = "No JSON data provided.";
const MISSING_FIELDS: &str = "Missing 'news_items' or 'target_language' in request body.";

/// Handler-level failure, rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

struct AppState<T> {
    translator: Arc<T>,
    source_language: Arc<str>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            translator: Arc::clone(&self.translator),
            source_language: Arc::clone(&self.source_language),
        }
    }
}

/// Build the router around `translator`, translating from `source_language`.
pub fn router<T>(translator: T, source_language: &str) -> Router
where
    T: Translate + Send + Sync + 'static,
{
    let state = AppState {
        translator: Arc::new(translator),
        source_language: Arc::from(source_language),
    };

    Router::new()
        .route("/", post(translate_handler::<T>).options(preflight))
        .route("/translate", post(translate_handler::<T>).options(preflight))
        .route("/health", get(health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the translation router until the process exits.
pub async fn serve<T>(translator: T, source_language: &str, addr: &str) -> std::io::Result<()>
where
    T: Translate + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, %source_language, "Translation server listening");
    axum::serve(listener, router(translator, source_language)).await
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, "3600"),
        ],
    )
}

async fn health() -> &'static str {
    "ok"
}

/// Decode and validate a translation request body.
fn parse_request(body: &[u8]) -> Result<TranslateRequest, ApiError> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(Value::Object(map)) if !map.is_empty() => Value::Object(map),
        _ => return Err(ApiError::BadRequest(NO_JSON.to_string())),
    };

    let request: TranslateRequest = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?;
    if !request.is_complete() {
        return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
    }
    Ok(request)
}

async fn translate_handler<T>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Json<Vec<NewsItem>>, ApiError>
where
    T: Translate + Send + Sync + 'static,
{
    let request = parse_request(&body).inspect_err(|e| warn!(error = %e, "Rejected translation request"))?;

    let items = translate_items(
        state.translator.as_ref(),
        &request.news_items,
        &request.target_language,
        &state.source_language,
    )
    .await
    .map_err(|e| {
        error!(error = %e, target = %request.target_language, "Translation failed");
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(items))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "Handler panicked");
    ApiError::Internal(detail).into_response()
}
