//! HTTP collaborator for the identity API: transport, auth and envelope unwrapping.
//!
//! - `@token` path templates resolved against a base URL
//! - GET/DELETE params as a query string, PUT params as a JSON body
//! - `Auth` for API key pairs (basic), bearer tokens, or custom headers
//! - Redacts secrets and never logs credential values
//! - Optional *raw* request/response logging via `IDLINK_HTTP_RAW=1`
//!
//! Each call issues exactly one request. Retries, rate limiting and caching
//! belong to callers.
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), idlink_http::HttpError> {
//! use idlink_http::{ApiClient, Auth, EnvelopeKey, HttpClient};
//!
//! let client = HttpClient::new("https://example.api.oneall.com")?
//!     .with_auth(Auth::Basic { username: "public".into(), password: "private".into() });
//! let outcome = client.get("identities/@token", Some("abc123"), None).await;
//! let identity = client.retrieve_data(outcome, EnvelopeKey::IDENTITY)?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), final errors, and (optionally)
//! raw request/response lines (target `http.raw`) when `IDLINK_HTTP_RAW=1`.

mod api;
mod path;

pub use api::{ApiClient, EnvelopeKey, Params, retrieve_data};
pub use path::{TOKEN_SLOT, encode_token, query_pairs, render_path};
pub use reqwest::StatusCode;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "IDLINK_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        if let Ok(s) = std::str::from_utf8(bytes) {
            let mut s = s.to_string();
            if truncate_on_char_boundary(&mut s, RAW_MAX_BODY) {
                s.push('…');
            }
            parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
        } else {
            parts.push(format!("--data-binary @- # ({} bytes)", bytes.len()));
        }
    }
    let mut shown = url.clone();
    let pairs = redact_pairs(
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
    );
    if pairs.is_empty() {
        shown.set_query(None);
    } else {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

fn is_secret_param(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "public_key"
            | "private_key"
            | "token"
            | "secret"
            | "client_secret"
            | "bearer"
    )
}

fn redact_pairs(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .map(|(k, v)| {
            if is_secret_param(&k) {
                (k, "<redacted>".to_string())
            } else {
                (k, v)
            }
        })
        .collect()
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
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
    #[error("response body has no `{0}` field")]
    MissingEnvelopeKey(&'static str),
}

// ==============================
// Auth
// ==============================

/// Authentication strategies supported by [`HttpClient`].
///
/// ```
/// use idlink_http::Auth;
///
/// let auth = Auth::Basic { username: "public".into(), password: "private".into() };
/// assert_eq!(auth.kind(), "basic");
/// // credentials never show up in debug output
/// assert!(!format!("{auth:?}").contains("private"));
/// ```
#[derive(Clone, Default)]
pub enum Auth {
    /// Site public/private key pair sent as HTTP basic auth.
    Basic { username: String, password: String },
    /// Authorization: Bearer <token>
    Bearer(String),
    /// Custom header carrying a credential
    Header { name: HeaderName, value: HeaderValue },
    #[default]
    None,
}

impl Auth {
    /// Label safe to put in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Basic { .. } => "basic",
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::None => "none",
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Auth::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
            Auth::None => f.write_str("None"),
        }
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    auth: Auth,
    pub default_timeout: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// A missing trailing slash is added so relative paths append to the base
    /// path instead of replacing its last segment.
    ///
    /// ```no_run
    /// use idlink_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://example.api.oneall.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(HttpError::Url(format!("{base} cannot be a base URL")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            auth: Auth::None,
            default_timeout: Duration::from_secs(15),
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Attach credentials sent with every request.
    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a path template and token against the base URL.
    ///
    /// The token is percent-encoded into a single path segment, so characters
    /// such as `/`, `?` or `#` cannot change which resource is addressed.
    ///
    /// ```
    /// use idlink_http::HttpClient;
    ///
    /// let client = HttpClient::new("https://example.api.oneall.com/v1").unwrap();
    /// let url = client.resolve("identities/@token", Some("abc")).unwrap();
    /// assert_eq!(url.as_str(), "https://example.api.oneall.com/v1/identities/abc");
    ///
    /// let url = client.resolve("identities/@token/contacts", Some("a?b")).unwrap();
    /// assert_eq!(url.path(), "/v1/identities/a%3Fb/contacts");
    /// ```
    pub fn resolve(&self, template: &str, token: Option<&str>) -> Result<Url, HttpError> {
        let encoded = token.map(encode_token).transpose()?;
        let path = render_path(template, encoded.as_deref());
        self.base
            .join(&path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn send_json(
        &self,
        method: Method,
        template: &str,
        token: Option<&str>,
        params: Params,
    ) -> Result<Value, HttpError> {
        let url = self.resolve(template, token)?;
        let timeout = self.default_timeout;

        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout)
            .header(ACCEPT, "application/json");

        // GET/DELETE carry params in the query, PUT/POST in a JSON body.
        let sends_body = matches!(method, Method::PUT | Method::POST);
        let mut request_body_bytes: Option<Vec<u8>> = None;
        let mut query: Vec<(String, String)> = Vec::new();
        if sends_body {
            let body = Value::Object(params.unwrap_or_default());
            let bytes = serde_json::to_vec(&body).map_err(|e| HttpError::Build(e.to_string()))?;
            request_body_bytes = Some(bytes.clone());
            rb = rb.header(CONTENT_TYPE, "application/json").body(bytes);
        } else {
            query = query_pairs(params.as_ref());
            if !query.is_empty() {
                rb = rb.query(&query);
            }
        }

        rb = match &self.auth {
            Auth::Basic { username, password } => rb.basic_auth(username, Some(password)),
            Auth::Bearer(tok) => rb.bearer_auth(sanitize_api_key(tok)?),
            Auth::Header { name, value } => rb.header(name.clone(), value.clone()),
            Auth::None => rb,
        };

        // ----- Safe request logging (pre-send) -----
        let req_id = format!("r{}", Uuid::new_v4().simple());
        let redacted_q = redact_pairs(query);

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?redacted_q,
            timeout_ms=timeout.as_millis() as u64,
            auth_kind=self.auth.kind(),
            has_body=%sends_body,
            "http.request.start"
        );

        if raw_enabled() {
            let mut shown = HeaderMap::new();
            if sends_body {
                shown.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            let mut full = url.clone();
            if !redacted_q.is_empty() {
                full.query_pairs_mut().extend_pairs(redacted_q.iter());
            }
            let curl = make_curl(&method, &full, &shown, request_body_bytes.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.send");
            HttpError::Network(message)
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.body");
            HttpError::Network(message)
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        let req_hdr_id = headers
            .get("x-request-id")
            .or_else(|| headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=content_len(&headers, bytes.len()),
            x_request_id=%req_hdr_id,
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let mut body_snip = bytes.to_vec();
            let truncated = body_snip.len() > RAW_MAX_BODY;
            if truncated {
                body_snip.truncate(RAW_MAX_BODY);
            }
            let text = String::from_utf8_lossy(&body_snip);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        let snippet = snip_body(&bytes);
        tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

        // ----- Success path -----
        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                tracing::warn!(
                    req_id=%req_id,
                    serde_line=%e.line(),
                    serde_col=%e.column(),
                    serde_err=%e.to_string(),
                    body_snippet=%snippet,
                    "http.response.decode_error"
                );
                HttpError::Decode(e.to_string(), snippet)
            });
        }

        let message = extract_error_message_multi(&bytes);
        let request_id = req_hdr_id.to_string();
        tracing::warn!(
            req_id=%req_id,
            %status,
            message=%message,
            x_request_id=%request_id,
            body_snippet=%snippet,
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            request_id,
        })
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn get(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        self.send_json(Method::GET, path, token, params).await
    }

    async fn put(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        self.send_json(Method::PUT, path, token, params).await
    }

    async fn del(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        self.send_json(Method::DELETE, path, token, params).await
    }
}

// ==============================
// Helpers
// ==============================

fn extract_error_message_multi(body: &[u8]) -> String {
    // Identity API: {"response":{"request":{"status":{"flag":"error","code":404,"info":"..."}}}}
    #[derive(Deserialize)]
    struct Envelope {
        response: EnvResponse,
    }
    #[derive(Deserialize)]
    struct EnvResponse {
        request: EnvRequest,
    }
    #[derive(Deserialize)]
    struct EnvRequest {
        status: EnvStatus,
    }
    #[derive(Deserialize)]
    struct EnvStatus {
        #[serde(default)]
        info: String,
        #[serde(default)]
        flag: String,
    }

    // Nested: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct NestedEnv {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // Generic: {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        let status = env.response.request.status;
        if !status.info.is_empty() {
            return status.info;
        }
        if !status.flag.is_empty() {
            return status.flag;
        }
    }
    if let Ok(env) = serde_json::from_slice::<NestedEnv>(body) {
        return env.error.message;
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

/// Cut `s` to at most `max` bytes without splitting a character.
/// Returns whether anything was removed.
fn truncate_on_char_boundary(s: &mut String, max: usize) -> bool {
    if s.len() <= max {
        return false;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    true
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if truncate_on_char_boundary(&mut snip, 500) {
        snip.push_str("...");
    }
    snip
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    // Trim outer spaces/quotes, then drop any embedded ASCII whitespace.
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

fn content_len(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(body_len)
}
