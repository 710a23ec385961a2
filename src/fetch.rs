//! Fetch-and-store pipeline.
//!
//! For each country, languages are processed one at a time:
//!
//! 1. Build the user query and system instruction
//! 2. Call the backend through [`RetryGenerate`]
//! 3. Extract the news list from the raw text
//! 4. Write a [`StoredRecord`] and record the outcome
//!
//! Exhausted retries, empty output, parse failures and store failures are
//! recorded for the language and the loop moves on. A non-retryable backend
//! error is recorded and stops the remaining languages of that country.

use crate::api::{Generate, GenerationRequest, RetryGenerate, RetryPolicy};
use crate::config::CountryLanguages;
use crate::extract::{ExtractError, parse_news_items};
use crate::models::{CountryReport, FetchOutcome, RunSummary, StoredRecord};
use crate::prompt::{system_instruction, user_query};
use crate::store::DocumentStore;
use crate::utils::{looks_truncated, truncate_for_log};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Drives the per-language sequence with an injected backend and store.
pub struct NewsFetcher<G, S> {
    generator: RetryGenerate<G>,
    store: S,
    model: String,
    grounding: bool,
}

impl<G, S> NewsFetcher<G, S>
where
    G: Generate,
    S: DocumentStore,
{
    pub fn new(generator: G, store: S, model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            generator: RetryGenerate::new(generator, policy),
            store,
            model: model.into(),
            grounding: true,
        }
    }

    /// Toggle search grounding on generation calls.
    pub fn with_grounding(mut self, grounding: bool) -> Self {
        self.grounding = grounding;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn generator(&self) -> &G {
        self.generator.inner()
    }

    fn request_for(&self, country: &str, language: &str) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            prompt: user_query(country),
            system_instruction: system_instruction(language),
            grounding: self.grounding,
        }
    }

    /// Fetch and store news for `country` in each of `languages`, in order.
    #[instrument(level = "info", skip_all, fields(%country))]
    pub async fn fetch_country(&self, country: &str, languages: &[String]) -> CountryReport {
        let mut report = CountryReport::new(country);

        for language in languages {
            info!(%language, "Querying news");
            let request = self.request_for(country, language);

            let text = match self.generator.generate(&request).await {
                Ok(text) => text,
                Err(e) if e.is_fatal() => {
                    error!(%language, error = %e, "Persistent backend error; abandoning remaining languages");
                    report
                        .outcomes
                        .insert(language.clone(), FetchOutcome::error(e.to_string()));
                    report.aborted = true;
                    break;
                }
                Err(e) => {
                    warn!(%language, error = %e, "Max retries reached; skipping language");
                    report
                        .outcomes
                        .insert(language.clone(), FetchOutcome::error(e.to_string()));
                    continue;
                }
            };

            let outcome = self.store_response(country, language, &text).await;
            report.outcomes.insert(language.clone(), outcome);
        }

        info!(
            successes = report.successes(),
            total = languages.len(),
            aborted = report.aborted,
            "Finished country"
        );
        report
    }

    async fn store_response(&self, country: &str, language: &str, text: &str) -> FetchOutcome {
        let items = match parse_news_items(text) {
            Ok(items) => items,
            Err(ExtractError::EmptyResponse) => {
                warn!(%language, "Model returned no text");
                return FetchOutcome::error(ExtractError::EmptyResponse.to_string());
            }
            Err(ExtractError::Parse { source, raw }) => {
                warn!(
                    %language,
                    error = %source,
                    truncated = looks_truncated(&source),
                    raw_preview = %truncate_for_log(&raw, 300),
                    "Model returned non-conforming JSON"
                );
                return FetchOutcome::error(format!(
                    "JSON decode error: {source}. Raw text was: {}",
                    truncate_for_log(&raw, 500)
                ));
            }
        };

        let items_count = items.len();
        let record = StoredRecord::new(country, language, items);
        match self.store.add(&record).await {
            Ok(doc_id) => {
                info!(%language, %doc_id, items_count, "Stored news");
                FetchOutcome::Success {
                    doc_id,
                    items_count,
                }
            }
            Err(e) => {
                error!(%language, error = %e, "Failed to store news");
                FetchOutcome::error(e.to_string())
            }
        }
    }

    /// Process the first `max_countries` entries of `countries` in order,
    /// pausing `pause` between consecutive countries.
    #[instrument(level = "info", skip_all, fields(max_countries = max_countries, pause = ?pause))]
    pub async fn run_batch(
        &self,
        countries: &[CountryLanguages],
        max_countries: usize,
        pause: Duration,
    ) -> RunSummary {
        let t0 = Instant::now();
        let mut summary = RunSummary::default();

        for (i, entry) in countries.iter().take(max_countries).enumerate() {
            if i > 0 {
                sleep(pause).await;
            }
            let report = self.fetch_country(&entry.country, &entry.languages).await;
            summary.countries.push(report);
        }

        info!(
            countries = summary.countries.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Batch complete"
        );
        summary
    }
}
