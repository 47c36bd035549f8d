#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offset-paginated JSON fetching for the food price API.
//!
//! Provides the [`Endpoint`] trait (one blocking GET round trip), an HTTP
//! implementation in [`http`], the page-walking [`json_paginated`] fetcher,
//! and the [`identifier`] token every request carries.
//!
//! Records are kept as raw JSON objects ([`RawRecord`]); column selection
//! happens downstream once all pages have been merged.

pub mod http;
pub mod identifier;
pub mod json_paginated;
pub mod progress;

use std::collections::BTreeMap;

/// Query parameters for a single request, keyed by parameter name.
pub type QueryParams = BTreeMap<String, String>;

/// One price observation exactly as the API returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while fetching pages.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The request could not be sent or the body could not be read
    /// (connection failure, timeout, etc.).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status} from {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// The full request URL, including query parameters.
        url: String,
    },

    /// The response body was not a recognised page shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The endpoint kept returning full pages past the configured guard.
    #[error("Page limit exceeded: {max_pages} full pages fetched without reaching the end")]
    PageLimitExceeded {
        /// The guard that tripped.
        max_pages: u32,
    },
}

/// A remote endpoint that answers one GET request with a response body.
///
/// Implementations perform exactly one round trip per call and must not
/// retry. Non-success statuses are reported as [`ScrapeError::Status`].
pub trait Endpoint {
    /// Issues a GET with the given query parameters and returns the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the request fails, times out, or the server
    /// answers with a non-success status.
    fn get(&self, params: &QueryParams) -> Result<String, ScrapeError>;
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn get(&self, params: &QueryParams) -> Result<String, ScrapeError> {
        (**self).get(params)
    }
}
