//! HTTP fetching of server pages as text.
//!
//! [`HttpClient::get_text`] retries transport failures, `429` and `5xx`
//! responses with exponential backoff, honouring `Retry-After` up to the
//! request timeout. Secrets in query strings and headers never reach the
//! logs. Setting `MAPWATCH_HTTP_RAW=1` adds a curl repro line and the raw
//! response under the `http.raw` target.
//!
//! ```no_run
//! # async fn demo() -> Result<(), mapwatch_http::HttpError> {
//! let client = mapwatch_http::HttpClient::new()?;
//! let html = client
//!     .get_text("http://example.com/server/1", mapwatch_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "MAPWATCH_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const BASE_BACKOFF_MS: u64 = 200;
const TOO_MANY_REQUESTS_FLOOR: Duration = Duration::from_millis(1100);
const USER_AGENT: &str = concat!("mapwatch/", env!("CARGO_PKG_VERSION"));
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl HttpError {
    /// HTTP status for `Api` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Per-request overrides of the client defaults.
///
/// The watcher fetches with `RequestOpts::default()`; the fields are for
/// library callers that need extra headers, query pairs or a different
/// timeout or retry budget for one request.
///
/// ```
/// use mapwatch_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     query: Some(vec![("tab", Cow::Borrowed("players"))]),
///     ..Default::default()
/// };
/// assert!(opts.retries.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

/// Why one attempt failed and whether another is worth making.
struct Failure {
    error: HttpError,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl Failure {
    fn network(err: reqwest::Error) -> Self {
        Self {
            error: HttpError::Network(err.to_string()),
            retryable: true,
            retry_after: None,
        }
    }

    /// Wait before the next attempt, never longer than `cap`.
    fn delay(&self, attempt: usize, cap: Duration) -> Duration {
        let wanted = match (self.retry_after, self.error.status()) {
            (Some(d), _) => d,
            (None, Some(StatusCode::TOO_MANY_REQUESTS)) => {
                backoff(attempt).max(TOO_MANY_REQUESTS_FLOOR)
            }
            (None, _) => backoff(attempt),
        };
        wanted.min(cap)
    }
}

impl HttpClient {
    /// A client with a 15 s request timeout and two retries.
    ///
    /// ```no_run
    /// use mapwatch_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?.with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// GET an absolute http(s) URL and return the body as text (lossy UTF-8).
    pub async fn get_text(&self, url: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let url = Url::parse(url).map_err(|e| HttpError::Url(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::Url(format!("unsupported scheme: {}", url.scheme())));
        }

        let retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let (host_path, mut shown_query) = redact_query(&url);
        if let Some(q) = &opts.query {
            shown_query.extend(q.iter().map(|(k, v)| redact_param(k, v)));
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            tracing::debug!(
                attempt,
                retries,
                host_path = %host_path,
                query = ?shown_query,
                timeout_ms = timeout.as_millis() as u64,
                "http.request.start"
            );

            let failure = match self.attempt(&url, &opts, timeout).await {
                Ok(body) => return Ok(String::from_utf8_lossy(&body).into_owned()),
                Err(f) => f,
            };

            if failure.retryable && attempt <= retries {
                let delay = failure.delay(attempt, timeout);
                tracing::warn!(
                    attempt,
                    retries,
                    host_path = %host_path,
                    backoff_ms = delay.as_millis() as u64,
                    error = %failure.error,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                attempt,
                host_path = %host_path,
                error = %failure.error,
                "http.failed"
            );
            return Err(failure.error);
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        opts: &RequestOpts<'_>,
        timeout: Duration,
    ) -> Result<Vec<u8>, Failure> {
        let mut req = self.inner.get(url.clone()).timeout(timeout);
        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            req = req.query(&pairs);
        }
        if let Some(h) = &opts.headers {
            req = req.headers(h.clone());
        }
        if raw_enabled() {
            let curl = make_curl(url, opts.headers.as_ref().unwrap_or(&HeaderMap::new()));
            tracing::debug!(target: "http.raw", %curl, "request");
        }

        let started = Instant::now();
        let resp = req.send().await.map_err(Failure::network)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(Failure::network)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            %status,
            duration_ms = elapsed_ms,
            body_len = content_len(&headers, body.len()),
            content_type = ?headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            "http.response"
        );
        if raw_enabled() {
            let shown = &body[..body.len().min(RAW_MAX_BODY)];
            tracing::info!(
                target: "http.raw",
                %status,
                duration_ms = elapsed_ms,
                headers = ?redact_headers(&headers),
                body = %String::from_utf8_lossy(shown),
                truncated = body.len() > RAW_MAX_BODY
            );
        }

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = snip_body(&body);
        tracing::trace!(%status, body_snippet = %message, "http.response.error_body");
        Err(Failure {
            retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            retry_after: retry_after_delay_secs(&headers).map(Duration::from_secs),
            error: HttpError::Api { status, message },
        })
    }
}

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_header(name: &str) -> bool {
    ["authorization", "cookie", "set-cookie"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token" | "auth" | "key" | "api_key" | "token" | "secret" | "password" | "session"
    )
}

fn redact_param(name: &str, value: &str) -> (String, String) {
    let shown = if is_secret_param(name) { REDACTED } else { value };
    (name.to_string(), shown.to_string())
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let shown = if is_secret_header(k.as_str()) {
                REDACTED
            } else {
                v.to_str().unwrap_or("")
            };
            (k.as_str().to_string(), shown.to_string())
        })
        .collect()
}

/// "host/path" plus the query pairs with secrets masked.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let pairs = url.query_pairs().map(|(k, v)| redact_param(&k, &v)).collect();
    (host_path, pairs)
}

/// A curl command that reproduces the request, secrets masked.
fn make_curl(url: &Url, headers: &HeaderMap) -> String {
    let mut shown = url.clone();
    let pairs = redact_query(url).1;
    if pairs.is_empty() {
        shown.set_query(None);
    } else {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let mut line = String::from("curl -XGET");
    for (name, value) in redact_headers(headers) {
        line.push_str(&format!(" -H '{name}: {}'", value.replace('\'', r"'\''")));
    }
    line.push_str(&format!(" '{shown}'"));
    line
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(1u64 << shift))
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(SNIPPET_MAX) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn content_len(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(body_len)
}
