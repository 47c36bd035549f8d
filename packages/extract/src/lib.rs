#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Food price extraction.
//!
//! The [`Extractor`] walks every (country, commodity) [`QueryDimension`] in
//! an [`ExtractScope`], fetches each one completely through a
//! [`PaginatedFetcher`], merges the non-empty results in scope order into a
//! [`Dataset`], and writes the allow-listed columns to a CSV file.
//!
//! Requests are issued strictly one at a time. What happens when a single
//! dimension fails is governed by [`FailurePolicy`].

pub mod config;
pub mod dataset;

use std::path::Path;
use std::sync::Arc;

use food_prices_extract_models::{
    DimensionFailure, ExtractScope, ExtractSummary, FailurePolicy, QueryDimension,
};
use food_prices_scraper::http::HttpEndpoint;
use food_prices_scraper::identifier::app_identifier;
use food_prices_scraper::json_paginated::PaginatedFetcher;
use food_prices_scraper::progress::{ProgressCallback, null_progress};
use food_prices_scraper::{Endpoint, QueryParams, RawRecord, ScrapeError};

use crate::config::{ConfigError, ExtractConfig};
use crate::dataset::Dataset;

/// Errors that can end an extraction run.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be set up.
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] ScrapeError),

    /// A dimension's fetch failed under [`FailurePolicy::Abort`].
    #[error("Fetch failed for {dimension}: {source}")]
    Dimension {
        /// The dimension whose fetch failed.
        dimension: QueryDimension,
        /// The underlying fetch error.
        #[source]
        source: ScrapeError,
    },

    /// No dimension produced any rows, so nothing was written.
    #[error("No rows returned. Check commodity names / filters.")]
    NoData {
        /// Dimensions that failed and were skipped along the way.
        failed: Vec<DimensionFailure>,
    },

    /// Writing the output file failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] csv::Error),
}

impl ExtractError {
    /// Process exit code for this error. An empty result exits with 1;
    /// every other failure exits with 2.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NoData { .. } => 1,
            _ => 2,
        }
    }
}

/// The records one query dimension returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionRows {
    /// The dimension that produced the records.
    pub dimension: QueryDimension,
    /// The records, in API order.
    pub records: Vec<RawRecord>,
}

/// Everything gathered across all query dimensions, before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    /// Non-empty results, in scope order.
    pub results: Vec<DimensionRows>,
    /// Dimensions that returned no rows.
    pub empty: Vec<QueryDimension>,
    /// Dimensions whose fetch failed and was skipped.
    pub failed: Vec<DimensionFailure>,
}

impl Collection {
    /// Total records across all retained results.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.results.iter().map(|r| r.records.len()).sum()
    }

    /// Merges the retained results, in scope order, into a [`Dataset`].
    #[must_use]
    pub fn into_dataset(self) -> Dataset {
        Dataset::merge(self.results.into_iter().map(|r| r.records))
    }
}

/// Builds the query parameters for one dimension. Pagination parameters are
/// added by the fetcher.
#[must_use]
pub fn query_params(
    scope: &ExtractScope,
    dimension: &QueryDimension,
    identifier: &str,
) -> QueryParams {
    let mut params = QueryParams::new();
    params.insert("app_identifier".to_owned(), identifier.to_owned());
    params.insert("location_code".to_owned(), dimension.country.clone());
    params.insert("commodity_name".to_owned(), dimension.commodity.clone());
    params.insert("price_type".to_owned(), scope.price_type.clone());
    params.insert("reference_period_start_min".to_owned(), scope.period_start());
    params.insert("reference_period_start_max".to_owned(), scope.period_end());
    params
}

/// Drives the paginated fetcher across every query dimension of a scope.
pub struct Extractor<E> {
    fetcher: PaginatedFetcher<E>,
    scope: ExtractScope,
    identifier: String,
    policy: FailurePolicy,
    progress: Arc<dyn ProgressCallback>,
}

impl<E: Endpoint> Extractor<E> {
    /// Creates an extractor with [`FailurePolicy::Abort`] and no progress
    /// reporting.
    #[must_use]
    pub fn new(fetcher: PaginatedFetcher<E>, scope: ExtractScope, identifier: String) -> Self {
        Self {
            fetcher,
            scope,
            identifier,
            policy: FailurePolicy::default(),
            progress: null_progress(),
        }
    }

    /// Builds an extractor for `endpoint` from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the scope cannot be resolved.
    pub fn from_config(
        config: &ExtractConfig,
        endpoint: E,
        current_year: i32,
    ) -> Result<Self, ConfigError> {
        let scope = config.scope(current_year)?;
        let fetcher = PaginatedFetcher::new(endpoint)
            .with_page_size(config.page_size)
            .with_max_pages(config.max_pages);
        log::debug!(
            "{} queries, {} records per page, at most {} full pages each",
            scope.dimension_count(),
            fetcher.page_size(),
            config.max_pages
        );
        let identifier = app_identifier(&config.app_name, &config.email);

        Ok(Self::new(fetcher, scope, identifier).with_failure_policy(config.failure_policy))
    }

    /// Sets what happens when one dimension's fetch fails.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reports one step per query dimension to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The scope this extractor covers.
    #[must_use]
    pub const fn scope(&self) -> &ExtractScope {
        &self.scope
    }

    /// Fetches every query dimension in scope order.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::Abort`], returns [`ExtractError::Dimension`] for
    /// the first dimension whose fetch fails. Under [`FailurePolicy::Skip`]
    /// this never fails; failures are recorded in [`Collection::failed`].
    pub fn collect(&self) -> Result<Collection, ExtractError> {
        let mut collection = Collection::default();

        self.progress
            .set_total(u64::try_from(self.scope.dimension_count()).unwrap_or(u64::MAX));

        for dimension in self.scope.dimensions() {
            self.progress.set_message(dimension.to_string());
            let params = query_params(&self.scope, &dimension, &self.identifier);

            match self.fetcher.fetch_all(&params) {
                Ok(records) if records.is_empty() => {
                    log::info!("{dimension}: no records");
                    collection.empty.push(dimension);
                }
                Ok(records) => {
                    log::info!("{dimension}: {} records", records.len());
                    collection.results.push(DimensionRows { dimension, records });
                }
                Err(e) => match self.policy {
                    FailurePolicy::Abort => {
                        log::error!("{dimension}: fetch failed, aborting run: {e}");
                        return Err(ExtractError::Dimension {
                            dimension,
                            source: e,
                        });
                    }
                    FailurePolicy::Skip => {
                        log::warn!("{dimension}: fetch failed, skipping: {e}");
                        collection.failed.push(DimensionFailure {
                            dimension,
                            error: e.to_string(),
                        });
                    }
                },
            }

            self.progress.inc(1);
        }

        self.progress.finish(format!(
            "{} records from {} of {} queries",
            collection.row_count(),
            collection.results.len(),
            self.scope.dimension_count()
        ));

        Ok(collection)
    }

    /// Collects every dimension and writes the merged dataset to
    /// `output_path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NoData`] without touching `output_path` when no
    /// dimension produced rows, any error from [`collect`](Self::collect),
    /// or [`ExtractError::Output`] if the file cannot be written.
    pub fn run(&self, output_path: &Path) -> Result<ExtractSummary, ExtractError> {
        let collection = self.collect()?;
        let empty = collection.empty.clone();
        let failed = collection.failed.clone();
        let dataset = collection.into_dataset();

        if dataset.is_empty() {
            return Err(ExtractError::NoData { failed });
        }

        dataset.write_to_path(output_path)?;
        log::info!(
            "Wrote {} rows to {}",
            dataset.len(),
            output_path.display()
        );

        Ok(ExtractSummary {
            output_path: output_path.to_path_buf(),
            rows: dataset.len(),
            columns: dataset
                .columns()
                .iter()
                .map(|column| column.name().to_owned())
                .collect(),
            scope: self.scope.clone(),
            empty,
            failed,
        })
    }
}

/// Runs a full extraction against the live API described by `config`.
///
/// # Errors
///
/// Returns [`ExtractError`] if the client cannot be built or the run fails.
pub fn run_extract(
    config: &ExtractConfig,
    current_year: i32,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExtractSummary, ExtractError> {
    let endpoint = HttpEndpoint::new(&config.base_url, &config.endpoint, config.timeout())
        .map_err(ExtractError::Client)?;
    log::info!("Fetching from {}", endpoint.url());

    Extractor::from_config(config, endpoint, current_year)?
        .with_progress(progress)
        .run(&config.output_path)
}
