//! Offset-paginated JSON fetcher.
//!
//! Walks an endpoint with `limit`/`offset` query parameters until a short or
//! empty page signals the end of the result set. Each response body is
//! resolved once into a [`PageBody`], which accepts both a bare JSON array of
//! records and an envelope object carrying the array under `data`.

use serde::Deserialize;

use crate::{Endpoint, QueryParams, RawRecord, ScrapeError};

/// Records requested per page when no page size is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Upper bound on pages fetched for one query when no guard is configured.
pub const DEFAULT_MAX_PAGES: u32 = 1_000;

/// Maximum length of the response body preview included in parse errors.
const BODY_PREVIEW_LEN: usize = 200;

/// One page of records, in either of the shapes the API returns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PageBody {
    /// The body is a bare JSON array of records.
    Bare(Vec<RawRecord>),
    /// The records are wrapped in an object under the `data` field.
    Envelope {
        /// The wrapped records.
        data: Vec<RawRecord>,
    },
}

impl PageBody {
    /// Parses a response body into a page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Parse`] if the body is not JSON, or is neither
    /// an array of objects nor an object with a `data` array of objects.
    pub fn parse(body: &str) -> Result<Self, ScrapeError> {
        serde_json::from_str(body).map_err(|e| {
            let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
            ScrapeError::Parse(format!(
                "expected a JSON array of records or an object with a `data` array ({e}); \
                 body preview: {preview}"
            ))
        })
    }

    /// Consumes the page and returns its records in API order.
    #[must_use]
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Bare(records) | Self::Envelope { data: records } => records,
        }
    }
}

/// Fetches every page of a query from an offset-paginated [`Endpoint`].
#[derive(Debug)]
pub struct PaginatedFetcher<E> {
    endpoint: E,
    page_size: u32,
    max_pages: u32,
}

impl<E: Endpoint> PaginatedFetcher<E> {
    /// Creates a fetcher with [`DEFAULT_PAGE_SIZE`] and [`DEFAULT_MAX_PAGES`].
    #[must_use]
    pub const fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Sets the number of records requested per page. Zero is raised to one.
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the number of full pages accepted before the next full page
    /// fails the query. Zero is raised to one.
    #[must_use]
    pub fn with_max_pages(mut self, max: u32) -> Self {
        self.max_pages = max.max(1);
        self
    }

    /// The number of records requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetches all records for `params`, starting at offset 0.
    ///
    /// `limit`, `offset`, and `output_format=json` are added to every
    /// request; any values for them in `params` are overwritten. Pages are
    /// concatenated in the order received.
    ///
    /// After `max_pages` full pages, one more page is requested. If it is
    /// empty or short the result set simply ended on the boundary.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScrapeError`] from the endpoint or from parsing a
    /// page, or [`ScrapeError::PageLimitExceeded`] when the page after
    /// `max_pages` full pages is full as well.
    pub fn fetch_all(&self, params: &QueryParams) -> Result<Vec<RawRecord>, ScrapeError> {
        let limit = self.page_size as usize;
        let mut all_records: Vec<RawRecord> = Vec::new();
        let mut offset: u64 = 0;

        for page in 0..self.max_pages {
            let records = self.fetch_page(params, offset)?;
            let count = records.len();

            log::debug!("Page {page} (offset={offset}): {count} records");

            if records.is_empty() {
                return Ok(all_records);
            }

            all_records.extend(records);

            if count < limit {
                return Ok(all_records);
            }

            offset += u64::from(self.page_size);
        }

        let tail = self.fetch_page(params, offset)?;
        log::debug!(
            "Page {} (offset={offset}): {} records",
            self.max_pages,
            tail.len()
        );

        if tail.len() < limit {
            all_records.extend(tail);
            return Ok(all_records);
        }

        log::warn!(
            "Stopped after {} full pages ({} records) without reaching the end",
            self.max_pages,
            all_records.len()
        );
        Err(ScrapeError::PageLimitExceeded {
            max_pages: self.max_pages,
        })
    }

    fn fetch_page(
        &self,
        params: &QueryParams,
        offset: u64,
    ) -> Result<Vec<RawRecord>, ScrapeError> {
        let mut query = params.clone();
        query.insert("limit".to_owned(), self.page_size.to_string());
        query.insert("offset".to_owned(), offset.to_string());
        query.insert("output_format".to_owned(), "json".to_owned());

        let body = self.endpoint.get(&query)?;
        Ok(PageBody::parse(&body)?.into_records())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Serves pre-scripted bodies in order and records every query.
    /// Requests past the end of the script get an empty array.
    struct ScriptedEndpoint {
        bodies: Vec<String>,
        requests: RefCell<Vec<QueryParams>>,
    }

    impl ScriptedEndpoint {
        fn new(bodies: Vec<String>) -> Self {
            Self {
                bodies,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<String> {
            self.requests
                .borrow()
                .iter()
                .map(|q| q["offset"].clone())
                .collect()
        }
    }

    impl Endpoint for ScriptedEndpoint {
        fn get(&self, params: &QueryParams) -> Result<String, ScrapeError> {
            let index = self.requests.borrow().len();
            self.requests.borrow_mut().push(params.clone());
            Ok(self
                .bodies
                .get(index)
                .cloned()
                .unwrap_or_else(|| "[]".to_owned()))
        }
    }

    /// Always answers with a full page of `size` records.
    struct EndlessEndpoint {
        size: usize,
        calls: RefCell<u32>,
    }

    impl Endpoint for EndlessEndpoint {
        fn get(&self, _params: &QueryParams) -> Result<String, ScrapeError> {
            *self.calls.borrow_mut() += 1;
            Ok(bare_page(0, self.size))
        }
    }

    struct FailingEndpoint;

    impl Endpoint for FailingEndpoint {
        fn get(&self, _params: &QueryParams) -> Result<String, ScrapeError> {
            Err(ScrapeError::Status {
                status: 503,
                url: "http://localhost/prices".to_owned(),
            })
        }
    }

    fn page_records(start: usize, count: usize) -> Vec<serde_json::Value> {
        (start..start + count)
            .map(|i| serde_json::json!({ "market_code": format!("M{i}"), "price": i }))
            .collect()
    }

    fn bare_page(start: usize, count: usize) -> String {
        serde_json::Value::Array(page_records(start, count)).to_string()
    }

    fn envelope_page(start: usize, count: usize) -> String {
        serde_json::json!({ "data": page_records(start, count) }).to_string()
    }

    fn base_params() -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("location_code".to_owned(), "PHL".to_owned());
        params
    }

    #[test]
    fn full_full_short_pages_fetch_three_times() {
        for limit in [1_usize, 3, 10] {
            let short = limit - 1;
            let endpoint = ScriptedEndpoint::new(vec![
                bare_page(0, limit),
                bare_page(limit, limit),
                bare_page(2 * limit, short),
            ]);
            let fetcher = PaginatedFetcher::new(&endpoint)
                .with_page_size(u32::try_from(limit).unwrap());

            let records = fetcher.fetch_all(&base_params()).unwrap();

            if short == 0 {
                // The third page is empty, which ends the walk the same way.
                assert_eq!(records.len(), 2 * limit);
            } else {
                assert_eq!(records.len(), 2 * limit + short);
            }
            assert_eq!(
                endpoint.offsets(),
                vec!["0".to_owned(), limit.to_string(), (2 * limit).to_string()]
            );
        }
    }

    #[test]
    fn preserves_page_order() {
        let endpoint = ScriptedEndpoint::new(vec![bare_page(0, 2), bare_page(2, 1)]);
        let fetcher = PaginatedFetcher::new(&endpoint).with_page_size(2);

        let records = fetcher.fetch_all(&base_params()).unwrap();
        let codes: Vec<&str> = records
            .iter()
            .map(|r| r["market_code"].as_str().unwrap())
            .collect();

        assert_eq!(codes, vec!["M0", "M1", "M2"]);
    }

    #[test]
    fn immediate_empty_page_stops_after_one_request() {
        let endpoint = ScriptedEndpoint::new(vec!["[]".to_owned()]);
        let fetcher = PaginatedFetcher::new(&endpoint).with_page_size(5);

        let records = fetcher.fetch_all(&base_params()).unwrap();

        assert!(records.is_empty());
        assert_eq!(endpoint.requests.borrow().len(), 1);
    }

    #[test]
    fn empty_envelope_stops_after_one_request() {
        let endpoint = ScriptedEndpoint::new(vec![r#"{"data": []}"#.to_owned()]);
        let fetcher = PaginatedFetcher::new(&endpoint).with_page_size(5);

        assert!(fetcher.fetch_all(&base_params()).unwrap().is_empty());
        assert_eq!(endpoint.requests.borrow().len(), 1);
    }

    #[test]
    fn envelope_and_bare_responses_produce_identical_output() {
        let bare = ScriptedEndpoint::new(vec![bare_page(0, 4), bare_page(4, 4), bare_page(8, 2)]);
        let wrapped = ScriptedEndpoint::new(vec![
            envelope_page(0, 4),
            envelope_page(4, 4),
            envelope_page(8, 2),
        ]);

        let from_bare = PaginatedFetcher::new(&bare)
            .with_page_size(4)
            .fetch_all(&base_params())
            .unwrap();
        let from_wrapped = PaginatedFetcher::new(&wrapped)
            .with_page_size(4)
            .fetch_all(&base_params())
            .unwrap();

        assert_eq!(from_bare, from_wrapped);
        assert_eq!(from_bare.len(), 10);
    }

    #[test]
    fn adds_pagination_params_and_keeps_caller_params() {
        let endpoint = ScriptedEndpoint::new(vec![bare_page(0, 1)]);
        let fetcher = PaginatedFetcher::new(&endpoint).with_page_size(50);

        fetcher.fetch_all(&base_params()).unwrap();

        let requests = endpoint.requests.borrow();
        let query = &requests[0];
        assert_eq!(query["limit"], "50");
        assert_eq!(query["offset"], "0");
        assert_eq!(query["output_format"], "json");
        assert_eq!(query["location_code"], "PHL");
    }

    #[test]
    fn page_guard_stops_an_endpoint_that_never_ends() {
        let endpoint = EndlessEndpoint {
            size: 3,
            calls: RefCell::new(0),
        };
        let fetcher = PaginatedFetcher::new(&endpoint)
            .with_page_size(3)
            .with_max_pages(4);

        let err = fetcher.fetch_all(&base_params()).unwrap_err();

        assert!(matches!(err, ScrapeError::PageLimitExceeded { max_pages: 4 }));
        assert_eq!(*endpoint.calls.borrow(), 5);
    }

    #[test]
    fn result_set_ending_exactly_at_the_guard_is_complete() {
        let endpoint =
            ScriptedEndpoint::new(vec![bare_page(0, 2), bare_page(2, 2), "[]".to_owned()]);
        let fetcher = PaginatedFetcher::new(&endpoint)
            .with_page_size(2)
            .with_max_pages(2);

        let records = fetcher.fetch_all(&base_params()).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(endpoint.offsets(), vec!["0", "2", "4"]);
    }

    #[test]
    fn short_page_just_past_the_guard_is_kept() {
        let endpoint =
            ScriptedEndpoint::new(vec![bare_page(0, 2), bare_page(2, 2), bare_page(4, 1)]);
        let fetcher = PaginatedFetcher::new(&endpoint)
            .with_page_size(2)
            .with_max_pages(2);

        let records = fetcher.fetch_all(&base_params()).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[4]["market_code"], "M4");
    }

    #[test]
    fn guard_allows_exactly_max_pages_when_last_is_short() {
        let endpoint = ScriptedEndpoint::new(vec![bare_page(0, 2), bare_page(2, 1)]);
        let fetcher = PaginatedFetcher::new(&endpoint)
            .with_page_size(2)
            .with_max_pages(2);

        assert_eq!(fetcher.fetch_all(&base_params()).unwrap().len(), 3);
    }

    #[test]
    fn endpoint_errors_propagate() {
        let fetcher = PaginatedFetcher::new(FailingEndpoint);

        let err = fetcher.fetch_all(&base_params()).unwrap_err();

        assert!(matches!(err, ScrapeError::Status { status: 503, .. }));
    }

    #[test]
    fn malformed_body_fails_the_fetch() {
        let endpoint = ScriptedEndpoint::new(vec![bare_page(0, 2), "<html>oops</html>".to_owned()]);
        let fetcher = PaginatedFetcher::new(&endpoint).with_page_size(2);

        let err = fetcher.fetch_all(&base_params()).unwrap_err();

        assert!(matches!(err, ScrapeError::Parse(_)));
    }

    #[test]
    fn parses_both_page_shapes() {
        assert!(matches!(
            PageBody::parse(r#"[{"price": 1}]"#).unwrap(),
            PageBody::Bare(_)
        ));
        assert!(matches!(
            PageBody::parse(r#"{"data": [{"price": 1}], "meta": {}}"#).unwrap(),
            PageBody::Envelope { .. }
        ));
    }

    #[test]
    fn rejects_object_without_data() {
        assert!(PageBody::parse(r#"{"detail": "unauthorized"}"#).is_err());
    }

    #[test]
    fn rejects_array_of_non_objects() {
        assert!(PageBody::parse("[1, 2, 3]").is_err());
    }

    #[test]
    fn zero_page_size_is_raised_to_one() {
        let fetcher = PaginatedFetcher::new(FailingEndpoint).with_page_size(0);
        assert_eq!(fetcher.page_size(), 1);
    }
}
