//! HTTP session wrapping reqwest.
//!
//! One client is built per run with a fixed browser-like header set and a
//! request timeout. Every non-2xx response is an error; there is no retry and
//! no backoff.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::types::{TidError, TidResult};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/127.0.0.0 Safari/537.36";

/// Headers sent with every request, in the shape x.com expects from a browser.
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("authority", "x.com"),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("referer", "https://x.com"),
    ("user-agent", USER_AGENT),
    ("x-twitter-active-user", "yes"),
    ("x-twitter-client-language", "en"),
];

/// Build the default header set attached to the session.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(DEFAULT_HEADERS.len());
    for &(name, value) in DEFAULT_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Successful response from the session.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Reusable HTTP session. Headers are fixed at construction.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a session with [`default_headers`] and the given per-request timeout.
    pub fn new(timeout: Duration) -> TidResult<Self> {
        Self::with_headers(default_headers(), timeout)
    }

    /// Create a session with a caller-supplied header set.
    pub fn with_headers(headers: HeaderMap, timeout: Duration) -> TidResult<Self> {
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TidError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// Per-request timeout applied to every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url`. Fails on transport errors, timeouts, and non-2xx statuses.
    pub async fn get(&self, url: &str) -> TidResult<HttpResponse> {
        tracing::debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TidError::Http {
                url: url.to_string(),
                source,
            })?;

        Self::finish(url, resp).await
    }

    /// Submit url-encoded form fields with the given HTTP method.
    pub async fn send_form(
        &self,
        method: &str,
        url: &str,
        fields: &[(String, String)],
    ) -> TidResult<HttpResponse> {
        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TidError::Config(format!("Unsupported form method: {method}")))?;

        tracing::debug!("{method} {url} ({} form fields)", fields.len());
        let resp = self
            .client
            .request(method, url)
            .form(fields)
            .send()
            .await
            .map_err(|source| TidError::Http {
                url: url.to_string(),
                source,
            })?;

        Self::finish(url, resp).await
    }

    async fn finish(url: &str, resp: reqwest::Response) -> TidResult<HttpResponse> {
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(TidError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| TidError::Http {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!("{url} -> {} ({} bytes)", status.as_u16(), body.len());

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}
