//! Document store for fetched news records.
//!
//! - [`FirestoreStore`]: adds one document per record to a Firestore collection
//!   through the REST API
//! - [`JsonDirStore`]: writes one JSON file per record under a local directory,
//!   for offline runs
//!
//! # Local Output Structure
//!
//! ```text
//! store_dir/
//! └── japan/
//!     └── japanese/
//!         └── 20251018T061500123456Z.json
//! ```

use crate::models::StoredRecord;
use crate::utils::{ensure_writable_dir, slugify};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Default Firestore collection for news records.
pub const DEFAULT_COLLECTION: &str = "news_summaries";

/// Default Firestore API root.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected write ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("store response has no document name")]
    MissingName,

    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can persist a [`StoredRecord`] and hand back its id.
pub trait DocumentStore {
    async fn add(&self, record: &StoredRecord) -> Result<String, StoreError>;
}

/// Encode a JSON value as a Firestore typed value.
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // integerValue is transported as a string
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

fn to_firestore_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect()
}

/// Firestore document body for a record.
pub fn firestore_document(record: &StoredRecord) -> Result<Value, StoreError> {
    let fields = match serde_json::to_value(record)? {
        Value::Object(map) => to_firestore_fields(&map),
        _ => Map::new(),
    };
    Ok(json!({ "fields": fields }))
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    name: Option<String>,
}

/// Firestore REST client bound to one project and collection.
pub struct FirestoreStore {
    http: Client,
    base_url: Url,
    project_id: String,
    access_token: String,
    collection: String,
}

impl fmt::Debug for FirestoreStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreStore")
            .field("project_id", &self.project_id)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl FirestoreStore {
    pub fn new(
        project_id: String,
        access_token: String,
        collection: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(FIRESTORE_BASE_URL)?,
            project_id,
            access_token,
            collection,
        })
    }

    fn endpoint(&self) -> Result<Url, StoreError> {
        Ok(self.base_url.join(&format!(
            "v1/projects/{}/databases/(default)/documents/{}",
            self.project_id, self.collection
        ))?)
    }
}

impl DocumentStore for FirestoreStore {
    #[instrument(level = "info", skip_all, fields(country = %record.country, language = %record.language))]
    async fn add(&self, record: &StoredRecord) -> Result<String, StoreError> {
        let resp = self
            .http
            .post(self.endpoint()?)
            .bearer_auth(&self.access_token)
            .json(&firestore_document(record)?)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let created: CreatedDocument = serde_json::from_str(&body)?;
        let doc_id = created
            .name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .ok_or(StoreError::MissingName)?
            .to_string();
        info!(%doc_id, "Added Firestore document");
        Ok(doc_id)
    }
}

/// Writes records as pretty-printed JSON files under `dir`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: String,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DocumentStore for JsonDirStore {
    #[instrument(level = "info", skip_all, fields(dir = %self.dir, country = %record.country, language = %record.language))]
    async fn add(&self, record: &StoredRecord) -> Result<String, StoreError> {
        let record_dir = format!(
            "{}/{}/{}",
            self.dir.trim_end_matches('/'),
            slugify(&record.country),
            slugify(&record.language)
        );
        ensure_writable_dir(&record_dir).await?;

        let doc_id = Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string();
        let path = format!("{record_dir}/{doc_id}.json");
        fs::write(&path, serde_json::to_string_pretty(record)?).await?;
        info!(%path, "Wrote record");
        Ok(doc_id)
    }
}

/// The store selected at startup.
#[derive(Debug)]
pub enum Store {
    Firestore(FirestoreStore),
    JsonDir(JsonDirStore),
}

impl DocumentStore for Store {
    async fn add(&self, record: &StoredRecord) -> Result<String, StoreError> {
        match self {
            Store::Firestore(store) => store.add(record).await,
            Store::JsonDir(store) => store.add(record).await,
        }
    }
}
