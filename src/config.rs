//! Runtime configuration loaded from an optional YAML file.
//!
//! Every key is optional; missing keys fall back to [`Config::default`].
//!
//! ```yaml
//! model: gemini-2.5-flash
//! max_attempts: 5
//! initial_backoff_secs: 5
//! country_pause_secs: 3
//! max_countries: 2
//! countries:
//!   - country: Japan
//!     languages: [Japanese, English]
//!   - country: Brazil
//!     languages: [Portuguese]
//! ```
//!
//! Secrets (API keys, access tokens) never live here; they come from the
//! command line or the environment, see [`crate::cli`].

use crate::api::{DEFAULT_MODEL, RetryPolicy};
use crate::store::DEFAULT_COLLECTION;
use crate::translate::DEFAULT_SOURCE_LANGUAGE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One country and the languages to fetch its news in, in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CountryLanguages {
    pub country: String,
    pub languages: Vec<String>,
}

impl CountryLanguages {
    pub fn new(country: &str, languages: &[&str]) -> Self {
        Self {
            country: country.to_string(),
            languages: languages.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Gemini model identifier.
    pub model: String,
    /// Enable Google Search grounding on generation calls.
    pub grounding: bool,
    /// Total generation attempts per language.
    pub max_attempts: usize,
    /// Wait after the first failed attempt, doubled after each further failure.
    pub initial_backoff_secs: u64,
    /// Pause between consecutive countries in a batch.
    pub country_pause_secs: u64,
    /// How many entries of `countries` a batch processes.
    pub max_countries: usize,
    /// Firestore collection records are added to.
    pub collection: String,
    /// Language stored records are written in; translation source.
    pub source_language: String,
    /// Timeout for store and translation HTTP calls.
    pub request_timeout_secs: u64,
    pub countries: Vec<CountryLanguages>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            grounding: true,
            max_attempts: 5,
            initial_backoff_secs: 5,
            country_pause_secs: 3,
            max_countries: 5,
            collection: DEFAULT_COLLECTION.to_string(),
            source_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            request_timeout_secs: 30,
            countries: default_countries(),
        }
    }
}

fn default_countries() -> Vec<CountryLanguages> {
    vec![
        CountryLanguages::new("United States of America", &["English", "Spanish"]),
        CountryLanguages::new("United Kingdom", &["English"]),
        CountryLanguages::new("Japan", &["Japanese", "English"]),
        CountryLanguages::new("Germany", &["German", "English"]),
        CountryLanguages::new("France", &["French", "English"]),
        CountryLanguages::new("Brazil", &["Portuguese", "English"]),
        CountryLanguages::new("India", &["Hindi", "English"]),
        CountryLanguages::new("Mexico", &["Spanish", "English"]),
        CountryLanguages::new("Egypt", &["Arabic", "English"]),
        CountryLanguages::new("South Korea", &["Korean", "English"]),
    ]
}

impl Config {
    /// Parse a YAML document and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if let Some(entry) = self.countries.iter().find(|c| c.languages.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "country {} has no languages",
                entry.country
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_secs(self.initial_backoff_secs),
        }
    }

    pub fn country_pause(&self) -> Duration {
        Duration::from_secs(self.country_pause_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load the config at `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(Config::default());
    };

    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
    let config = Config::from_yaml(&yaml)?;
    info!(
        model = %config.model,
        countries = config.countries.len(),
        max_countries = config.max_countries,
        "Loaded configuration"
    );
    Ok(config)
}
