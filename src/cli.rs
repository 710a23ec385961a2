//! Command-line interface definitions for News Curator.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets can be provided via command-line flags or environment variables.

use crate::api::GEMINI_BASE_URL;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for the News Curator application.
///
/// # Examples
///
/// ```sh
/// # Fetch the configured countries into Firestore
/// news_curator fetch
///
/// # One country, two languages, written to local JSON files
/// news_curator fetch --country "United States of America" -l English -l Spanish -o ./records
///
/// # Offline dry run with the mock generator
/// news_curator fetch --mock -o ./records
///
/// # Serve the translation endpoint
/// news_curator serve --port 8080
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "NEWS_CURATOR_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch news per country and language and store the results
    Fetch(FetchArgs),
    /// Serve the HTTP translation endpoint
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini API root
    #[arg(long, env = "GEMINI_BASE_URL", default_value = GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    /// Use canned mock responses instead of calling Gemini
    #[arg(long)]
    pub mock: bool,

    /// Firestore project id
    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub firestore_project: Option<String>,

    /// OAuth access token for Firestore (e.g. from `gcloud auth print-access-token`)
    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    pub firestore_token: Option<String>,

    /// Write records as JSON files under this directory instead of Firestore
    #[arg(short = 'o', long)]
    pub store_dir: Option<String>,

    /// Fetch a single country instead of the configured list
    #[arg(long, requires = "languages")]
    pub country: Option<String>,

    /// Language to fetch for --country (repeatable, in order)
    #[arg(short, long = "language", value_name = "LANGUAGE")]
    pub languages: Vec<String>,

    /// Override the configured number of countries to process
    #[arg(long)]
    pub max_countries: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Google Cloud Translation API key
    #[arg(long, env = "TRANSLATE_API_KEY", hide_env_values = true)]
    pub translate_api_key: String,

    /// Address to bind
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,
}
