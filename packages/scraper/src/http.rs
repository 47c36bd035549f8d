//! Blocking HTTP implementation of [`Endpoint`].

use std::time::Duration;

use crate::{Endpoint, QueryParams, ScrapeError};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An [`Endpoint`] backed by a blocking [`reqwest`] client.
///
/// Each call to [`Endpoint::get`] is a single round trip bounded by the
/// client's timeout. Nothing is retried.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpEndpoint {
    /// Creates an endpoint for `base_url` joined with `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        Self::with_builder(reqwest::blocking::Client::builder(), base_url, path, timeout)
    }

    fn with_builder(
        builder: reqwest::blocking::ClientBuilder,
        base_url: &str,
        path: &str,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = builder
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: join_url(base_url, path),
        })
    }

    /// The full endpoint URL, without query parameters.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Endpoint for HttpEndpoint {
    fn get(&self, params: &QueryParams) -> Result<String, ScrapeError> {
        let response = self.client.get(&self.url).query(params).send()?;
        let status = response.status();

        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        Ok(response.text()?)
    }
}

/// Joins a base URL and an endpoint path with exactly one `/` between them.
fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::json_paginated::PaginatedFetcher;

    /// Accepts a single connection on a loopback port and passes the request
    /// head (request line plus headers) to `respond`. A `None` reply leaves
    /// the connection open and silent for a few seconds.
    fn serve_once<F>(respond: F) -> (String, thread::JoinHandle<()>)
    where
        F: FnOnce(&str) -> Option<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() <= 2 {
                    break;
                }
                head.push_str(&line);
            }

            match respond(&head) {
                Some(response) => stream.write_all(response.as_bytes()).unwrap(),
                None => thread::sleep(Duration::from_secs(3)),
            }
        });

        (format!("http://{addr}"), handle)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn local_endpoint(base_url: &str, timeout: Duration) -> HttpEndpoint {
        let builder = reqwest::blocking::Client::builder().no_proxy();
        HttpEndpoint::with_builder(builder, base_url, "/prices", timeout).unwrap()
    }

    fn params() -> QueryParams {
        let mut params = QueryParams::new();
        params.insert("app_identifier".to_owned(), "dG9rZW4=".to_owned());
        params.insert("commodity_name".to_owned(), "Cooking Oil".to_owned());
        params
    }

    #[test]
    fn server_error_status_is_reported_with_url() {
        let (base_url, server) =
            serve_once(|_| Some(http_response("500 Internal Server Error", "")));
        let endpoint = local_endpoint(&base_url, DEFAULT_TIMEOUT);

        let err = endpoint.get(&params()).unwrap_err();

        match err {
            ScrapeError::Status { status, url } => {
                assert_eq!(status, 500);
                assert!(url.starts_with(&format!("{base_url}/prices?")), "{url}");
            }
            other => panic!("expected a status error, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn silent_server_times_out_as_transport_error() {
        let (base_url, _server) = serve_once(|_| None);
        let endpoint = local_endpoint(&base_url, Duration::from_secs(1));

        let err = endpoint.get(&params()).unwrap_err();

        assert!(matches!(err, ScrapeError::Http(_)), "{err:?}");
    }

    #[test]
    fn pagination_and_filters_reach_the_query_string() {
        let (base_url, server) = serve_once(|head| {
            let body = serde_json::json!([{ "request": head }]).to_string();
            Some(http_response("200 OK", &body))
        });
        let fetcher =
            PaginatedFetcher::new(local_endpoint(&base_url, DEFAULT_TIMEOUT)).with_page_size(10);

        let records = fetcher.fetch_all(&params()).unwrap();
        server.join().unwrap();

        assert_eq!(records.len(), 1);
        let head = records[0]["request"].as_str().unwrap();
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with("GET /prices?"), "{request_line}");
        assert!(request_line.contains("offset=0"), "{request_line}");
        assert!(request_line.contains("limit=10"), "{request_line}");
        assert!(request_line.contains("output_format=json"), "{request_line}");
        assert!(request_line.contains("app_identifier=dG9rZW4%3D"), "{request_line}");
        assert!(request_line.contains("commodity_name=Cooking+Oil"), "{request_line}");
        assert!(
            head.to_ascii_lowercase().contains("accept: application/json"),
            "{head}"
        );
    }

    #[test]
    fn joins_base_and_path() {
        assert_eq!(
            join_url("https://api.example.org/v2", "/food-prices"),
            "https://api.example.org/v2/food-prices"
        );
    }

    #[test]
    fn joins_without_doubling_slashes() {
        assert_eq!(
            join_url("https://api.example.org/v2/", "/food-prices"),
            "https://api.example.org/v2/food-prices"
        );
        assert_eq!(
            join_url("https://api.example.org/v2", "food-prices"),
            "https://api.example.org/v2/food-prices"
        );
    }

    #[test]
    fn empty_path_keeps_base() {
        assert_eq!(join_url("https://api.example.org/", ""), "https://api.example.org");
    }

    #[test]
    fn builds_endpoint_url() {
        let endpoint =
            HttpEndpoint::new("https://api.example.org/v2", "/prices", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(endpoint.url(), "https://api.example.org/v2/prices");
    }
}
