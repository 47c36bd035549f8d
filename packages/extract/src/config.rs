//! Run configuration.
//!
//! The default configuration is a TOML document baked into the binary at
//! compile time via [`include_str!`]. A different file with the same keys can
//! be loaded with [`ExtractConfig::load`]. The configuration is validated once
//! and resolved into an immutable [`ExtractScope`] before any request is made.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike as _;
use food_prices_extract_models::{ExtractScope, FailurePolicy};
use food_prices_scraper::json_paginated::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

/// The default configuration, embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has missing/unknown keys.
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but its values are unusable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

const fn default_window_years() -> u32 {
    5
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

const fn default_timeout_secs() -> u64 {
    60
}

/// Everything a run needs, as read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    /// API base URL (e.g., `"https://hapi.humdata.org/api/v2"`).
    pub base_url: String,
    /// Endpoint path appended to `base_url`.
    pub endpoint: String,
    /// Application name half of the identifier token.
    pub app_name: String,
    /// Contact email half of the identifier token.
    pub email: String,
    /// Country codes to query, in merge order.
    pub countries: Vec<String>,
    /// Commodity names to query, in merge order within each country.
    pub commodities: Vec<String>,
    /// Price type filter.
    pub price_type: String,
    /// Length of the rolling window in years, ending at `end_year` (or the
    /// current year).
    #[serde(default = "default_window_years")]
    pub window_years: u32,
    /// Explicit first year. Overrides the rolling window when set.
    #[serde(default)]
    pub start_year: Option<i32>,
    /// Explicit last year. Defaults to the current calendar year.
    #[serde(default)]
    pub end_year: Option<i32>,
    /// Where the CSV is written. Parent directories are created as needed.
    pub output_path: PathBuf,
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum pages fetched for one query dimension.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// What to do when one dimension's fetch fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl ExtractConfig {
    /// Parses and validates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is malformed, has unknown or
    /// missing keys, or fails [`validate`](Self::validate).
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded document does not parse.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::parse(DEFAULT_CONFIG_TOML)
    }

    /// Reads, parses, and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&toml_str)
    }

    /// Checks that the configuration describes a runnable extraction.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));

        if self.base_url.trim().is_empty() {
            return invalid("base_url is empty");
        }
        if self.app_name.trim().is_empty() || self.email.trim().is_empty() {
            return invalid("app_name and email must both be set");
        }
        if self.countries.is_empty() || self.countries.iter().any(|c| c.trim().is_empty()) {
            return invalid("countries must be a non-empty list of non-empty codes");
        }
        if self.commodities.is_empty() || self.commodities.iter().any(|c| c.trim().is_empty()) {
            return invalid("commodities must be a non-empty list of non-empty names");
        }
        if self.price_type.trim().is_empty() {
            return invalid("price_type is empty");
        }
        if self.window_years == 0 {
            return invalid("window_years must be at least 1");
        }
        if self.page_size == 0 {
            return invalid("page_size must be at least 1");
        }
        if self.max_pages == 0 {
            return invalid("max_pages must be at least 1");
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be at least 1");
        }
        if let (Some(start), Some(end)) = (self.start_year, self.end_year)
            && start > end
        {
            return Err(ConfigError::Invalid(format!(
                "start_year {start} is after end_year {end}"
            )));
        }
        Ok(())
    }

    /// Resolves the run scope, taking `current_year` as the end of the
    /// rolling window when `end_year` is not set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the resolved window is empty.
    pub fn scope(&self, current_year: i32) -> Result<ExtractScope, ConfigError> {
        let end_year = self.end_year.unwrap_or(current_year);
        let span = i32::try_from(self.window_years.saturating_sub(1)).unwrap_or(i32::MAX);
        let start_year = self
            .start_year
            .unwrap_or_else(|| end_year.saturating_sub(span));

        if start_year > end_year {
            return Err(ConfigError::Invalid(format!(
                "start_year {start_year} is after end_year {end_year}"
            )));
        }

        Ok(ExtractScope {
            countries: self.countries.clone(),
            commodities: self.commodities.clone(),
            price_type: self.price_type.clone(),
            start_year,
            end_year,
        })
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The current calendar year in local time.
#[must_use]
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
