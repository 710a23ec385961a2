//! # News Curator
//!
//! Fetches the most discussed news per country from Gemini with Google Search
//! grounding, normalizes the model's output into structured records, and
//! stores one document per (country, language). A companion HTTP endpoint
//! translates stored items into other languages on demand.
//!
//! ## Usage
//!
//! ```sh
//! news_curator fetch --country Japan -l Japanese -l English
//! news_curator serve --port 8080
//! ```
//!
//! ## Architecture
//!
//! Two independent pipelines:
//! 1. **Fetch**: prompt → Gemini (with retry/backoff) → extract JSON → store
//! 2. **Translate**: HTTP request → translate each field → JSON response
//!
//! Both run strictly sequentially; clients are built once here and injected.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod extract;
mod fetch;
mod models;
mod prompt;
mod server;
mod store;
mod translate;
mod utils;

use api::{GeminiClient, Generator, MockGenerator};
use cli::{Cli, Command, FetchArgs, ServeArgs};
use config::{Config, CountryLanguages, load_config};
use fetch::NewsFetcher;
use store::{FirestoreStore, JsonDirStore, Store};
use translate::GoogleTranslator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(config = ?args.config, "Parsed CLI arguments");

    let config = load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Fetch(fetch_args) => run_fetch(&config, fetch_args).await,
        Command::Serve(serve_args) => run_serve(&config, serve_args).await,
    }
}

fn build_generator(args: &FetchArgs) -> Result<Generator, Box<dyn Error>> {
    if args.mock {
        info!("Using mock generator");
        return Ok(Generator::Mock(MockGenerator));
    }
    let api_key = args
        .gemini_api_key
        .clone()
        .ok_or("GEMINI_API_KEY (or --gemini-api-key) is required unless --mock is given")?;
    Ok(Generator::Gemini(GeminiClient::new(
        api_key,
        &args.gemini_base_url,
    )?))
}

fn build_store(config: &Config, args: &FetchArgs) -> Result<Store, Box<dyn Error>> {
    if let Some(dir) = &args.store_dir {
        info!(%dir, "Writing records to local JSON files");
        return Ok(Store::JsonDir(JsonDirStore::new(dir.clone())));
    }
    let project = args
        .firestore_project
        .clone()
        .ok_or("FIRESTORE_PROJECT_ID is required unless --store-dir is given")?;
    let token = args
        .firestore_token
        .clone()
        .ok_or("FIRESTORE_ACCESS_TOKEN is required unless --store-dir is given")?;
    info!(%project, collection = %config.collection, "Writing records to Firestore");
    Ok(Store::Firestore(FirestoreStore::new(
        project,
        token,
        config.collection.clone(),
        config.request_timeout(),
    )?))
}

#[instrument(level = "info", skip_all)]
async fn run_fetch(config: &Config, args: FetchArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    let generator = build_generator(&args)?;
    let store = build_store(config, &args)?;

    let (countries, max_countries) = match &args.country {
        Some(country) => (
            vec![CountryLanguages {
                country: country.clone(),
                languages: args.languages.clone(),
            }],
            1,
        ),
        None => (
            config.countries.clone(),
            args.max_countries.unwrap_or(config.max_countries),
        ),
    };
    info!(
        countries = countries.len().min(max_countries),
        model = %config.model,
        "Starting news fetch"
    );

    let fetcher = NewsFetcher::new(generator, store, config.model.clone(), config.retry_policy())
        .with_grounding(config.grounding);
    let summary = fetcher
        .run_batch(&countries, max_countries, config.country_pause())
        .await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
    Ok(())
}

async fn run_serve(config: &Config, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let translator = GoogleTranslator::new(args.translate_api_key, config.request_timeout())?;
    let addr = format!("{}:{}", args.host, args.port);
    server::serve(translator, &config.source_language, &addr).await?;
    Ok(())
}
