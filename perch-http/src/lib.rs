//! HTTP transport for the perch console with safe logging and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - Redacts sensitive query params and never logs secret values
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//!   (opt-in per request; page loads run with a zero budget)
//! - Optional raw response logging via `PERCH_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), perch_http::HttpError> {
//! let client = perch_http::HttpClient::new("https://localhost:8443")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/timeline", perch_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Errors follow the console's three failure classes: `Transport` when the
//! request could not be sent or the response body could not be read,
//! `Status` when the server answered with a non-success code, and
//! `Contract` when a success body was not the JSON shape the caller asked
//! for. Construction problems surface as `Url`/`Build`.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggle
// ==============================

const RAW_ENV: &str = "PERCH_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    /// The request could not be sent or the response could not be read.
    #[error("network error: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("HTTP {status} {reason} - {body}")]
    Status {
        status: StatusCode,
        reason: String,
        body: String,
    },
    /// A success response whose body was not the expected JSON shape.
    #[error("contract violation: {message}, body_snippet: {body_snippet}")]
    Contract {
        message: String,
        body_snippet: String,
    },
}

impl HttpError {
    fn status(status: StatusCode, body: &[u8]) -> Self {
        Self::Status {
            status,
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: snip_body(body),
        }
    }
}

// ==============================
// Auth & request options
// ==============================

/// Authentication strategies attached per request.
///
/// ```
/// use perch_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g. `X-XSRF-TOKEN`)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

/// Per-request tuning knobs.
///
/// ```
/// use perch_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.auth.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// The underlying client keeps a cookie store: the backend's refresh and
    /// CSRF endpoints work through cookies, the way the reference console
    /// ran every fetch with credentials included.
    ///
    /// ```no_run
    /// use perch_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://localhost:8443")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        Self::build(base, false)
    }

    /// Like [`HttpClient::new`] but accepting invalid TLS certificates, for
    /// dev backends served on `https://localhost` with a self-signed cert.
    pub fn insecure(base: &str) -> Result<Self, HttpError> {
        Self::build(base, true)
    }

    fn build(base: &str, accept_invalid_certs: bool) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .cookie_store(true)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    // ==============================
    // JSON API
    // ==============================

    /// GET a JSON body and decode it into `T`.
    // FIXME(content-type): decode ignores the response content-type here;
    // route HTML error pages through the same tolerant path request_value uses.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let (status, _, bytes) = self.request_raw(Method::GET, path, None, &opts).await?;
        if !status.is_success() {
            return Err(HttpError::status(status, &bytes));
        }
        decode_json(&bytes)
    }

    /// POST a JSON body and decode the JSON response into `T`.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let (status, _, resp) = self
            .request_raw(Method::POST, path, Some(bytes), &opts)
            .await?;
        if !status.is_success() {
            return Err(HttpError::status(status, &resp));
        }
        decode_json(&resp)
    }

    /// Issue a request whose success body may be JSON, something else, or
    /// empty. Returns `Some(value)` only when the server said
    /// `Content-Type: application/json`, the behavior of the reference
    /// console's shared fetch helper. Endpoints like follow/like/repost
    /// answer `204 No Content` on some server builds and a JSON document on
    /// others; both land here.
    pub async fn request_value<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<Option<serde_json::Value>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let body_bytes = match body {
            Some(b) => {
                Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?)
            }
            None => None,
        };
        let (status, headers, bytes) = self.request_raw(method, path, body_bytes, &opts).await?;
        if !status.is_success() {
            return Err(HttpError::status(status, &bytes));
        }
        if !is_json(&headers) || bytes.is_empty() {
            return Ok(None);
        }
        decode_json(&bytes).map(Some)
    }

    /// GET a raw body (media downloads).
    pub async fn get_bytes(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<Vec<u8>, HttpError> {
        let (status, _, bytes) = self.request_raw(Method::GET, path, None, &opts).await?;
        if !status.is_success() {
            return Err(HttpError::status(status, &bytes));
        }
        Ok(bytes)
    }

    /// POST a multipart form. Forms are not replayable, so this path never
    /// retries regardless of the configured budget.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        opts: RequestOpts<'_>,
    ) -> Result<Option<serde_json::Value>, HttpError> {
        let url = self.join(path)?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let mut rb = self.inner.post(url.clone()).timeout(timeout).multipart(form);
        rb = apply_query(rb, &opts);
        rb = apply_headers_and_auth(rb, &opts)?;

        log_request_start(&Method::POST, &url, &opts, 1, 0, timeout, true);

        let resp = rb
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        log_response(&status, &headers, &bytes, 0);

        if !status.is_success() {
            return Err(HttpError::status(status, &bytes));
        }
        if !is_json(&headers) || bytes.is_empty() {
            return Ok(None);
        }
        decode_json(&bytes).map(Some)
    }

    // ==============================
    // Core request implementation
    // ==============================

    fn join(&self, path: &str) -> Result<Url, HttpError> {
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// Send with retry handling and return the final `(status, headers,
    /// body)` regardless of status class. Network failures retry within the
    /// budget; 429/5xx retry honoring `Retry-After`. Anything else is final.
    async fn request_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: &RequestOpts<'_>,
    ) -> Result<(StatusCode, HeaderMap, Vec<u8>), HttpError> {
        let url = self.join(path)?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let mut attempt = 0usize;

        loop {
            let mut rb = self.inner.request(method.clone(), url.clone()).timeout(timeout);
            rb = apply_query(rb, opts);
            if let Some(bytes) = &body {
                rb = rb.header(CONTENT_TYPE, "application/json").body(bytes.clone());
            }
            rb = apply_headers_and_auth(rb, opts)?;

            log_request_start(
                &method,
                &url,
                opts,
                attempt + 1,
                max_retries,
                timeout,
                body.is_some(),
            );

            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            message = %err,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Transport(err.to_string()));
                }
            };
            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            message = %err,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    return Err(HttpError::Transport(err.to_string()));
                }
            };

            log_response(&status, &headers, &bytes, t0.elapsed().as_millis() as u64);

            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            if (is_429 || status.is_server_error()) && attempt < max_retries {
                attempt += 1;
                let delay = if let Some(secs) = retry_after_delay_secs(&headers) {
                    Duration::from_secs(secs)
                } else {
                    let exp = backoff_delay(attempt);
                    if is_429 {
                        // default floor for 429 when no Retry-After is present
                        exp.max(Duration::from_millis(1100))
                    } else {
                        exp
                    }
                };
                tracing::warn!(
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    body_snippet = %snip_body(&bytes),
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                tracing::warn!(
                    %status,
                    message = %extract_error_message(&bytes),
                    body_snippet = %snip_body(&bytes),
                    "http.error"
                );
            }
            return Ok((status, headers, bytes));
        }
    }
}

// ==============================
// Request building helpers
// ==============================

fn apply_query(mut rb: reqwest::RequestBuilder, opts: &RequestOpts<'_>) -> reqwest::RequestBuilder {
    if let Some(q) = &opts.query {
        let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
        rb = rb.query(&pairs);
    }
    rb
}

fn apply_headers_and_auth(
    mut rb: reqwest::RequestBuilder,
    opts: &RequestOpts<'_>,
) -> Result<reqwest::RequestBuilder, HttpError> {
    if let Some(hdrs) = &opts.headers {
        rb = rb.headers(hdrs.clone());
    }
    match &opts.auth {
        Some(Auth::Bearer(tok)) => {
            let tok = sanitize_bearer(tok)?;
            Ok(rb.bearer_auth(tok))
        }
        Some(Auth::Header { name, value }) => Ok(rb.header(name, value)),
        Some(Auth::None) | None => Ok(rb),
    }
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt - 1)))
}

// ==============================
// Logging helpers
// ==============================

fn log_request_start(
    method: &Method,
    url: &Url,
    opts: &RequestOpts<'_>,
    attempt: usize,
    max_retries: usize,
    timeout: Duration,
    has_body: bool,
) {
    let auth_kind = match &opts.auth {
        Some(Auth::Bearer(_)) => "bearer",
        Some(Auth::Header { .. }) => "header",
        Some(Auth::None) | None => "none",
    };
    let redacted_q: Vec<(String, String)> = opts
        .query
        .as_ref()
        .map(|q| {
            q.iter()
                .map(|(k, v)| {
                    (
                        (*k).to_string(),
                        if is_secret_param(k) {
                            "<redacted>".to_string()
                        } else {
                            v.as_ref().to_string()
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    tracing::debug!(
        attempt,
        max_retries,
        method = %method,
        host_path = %format!("{}{}", url.domain().unwrap_or("-"), url.path()),
        query = ?redacted_q,
        timeout_ms = timeout.as_millis() as u64,
        auth_kind,
        has_body,
        "http.request.start"
    );
}

fn log_response(status: &StatusCode, headers: &HeaderMap, bytes: &[u8], dur_ms: u64) {
    tracing::debug!(
        %status,
        duration_ms = dur_ms,
        body_len = bytes.len(),
        content_type = %headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-"),
        "http.response"
    );

    if raw_enabled() {
        let hdrs = redact_headers(headers);
        let truncated = bytes.len() > RAW_MAX_BODY;
        let shown = &bytes[..bytes.len().min(RAW_MAX_BODY)];
        tracing::info!(
            target: "http.raw",
            status = %status,
            duration_ms = dur_ms,
            headers = ?hdrs,
            body = %String::from_utf8_lossy(shown),
            truncated
        );
    }
}

fn is_secret_param(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "bearer"
    )
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") {
                val = "Bearer <redacted>".into();
            } else if key.eq_ignore_ascii_case("x-xsrf-token") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Body helpers
// ==============================

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(bytes).map_err(|e| {
        let snippet = snip_body(bytes);
        tracing::warn!(
            serde_line = %e.line(),
            serde_col = %e.column(),
            serde_err = %e.to_string(),
            body_snippet = %snippet,
            "http.response.decode_error"
        );
        HttpError::Contract {
            message: e.to_string(),
            body_snippet: snippet,
        }
    })
}

fn extract_error_message(body: &[u8]) -> String {
    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(serde::Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.detail.is_empty() {
            return m.detail;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(500);
        snip.push_str("...");
    }
    snip
}

fn sanitize_bearer(raw: &str) -> Result<String, HttpError> {
    // Trim outer spaces/quotes, then strip all ASCII whitespace. Pasted
    // tokens routinely pick up newlines on the way through a clipboard.
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("bearer token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_whitespace_and_quotes() {
        assert_eq!(sanitize_bearer("  \"abc.def\"\n").unwrap(), "abc.def");
        assert_eq!(sanitize_bearer("a b\tc").unwrap(), "abc");
    }

    #[test]
    fn sanitize_rejects_control_bytes() {
        assert!(sanitize_bearer("ab\u{0}cd").is_err());
    }

    #[test]
    fn secret_params_are_flagged() {
        assert!(is_secret_param("access_token"));
        assert!(is_secret_param("API_KEY"));
        assert!(!is_secret_param("cursor"));
        assert!(!is_secret_param("limit"));
    }

    #[test]
    fn snip_caps_long_bodies() {
        let s = snip_body(&vec![b'x'; 2000]);
        assert!(s.ends_with("..."));
        assert_eq!(s.len(), 503);
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(
            extract_error_message(br#"{"message":"nope"}"#),
            "nope".to_string()
        );
        assert_eq!(
            extract_error_message(br#"{"error":"bad cursor"}"#),
            "bad cursor".to_string()
        );
        assert_eq!(extract_error_message(b"plain text"), "plain text".to_string());
    }
}
