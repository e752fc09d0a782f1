//! The collaborator seam that resource wrappers call into.
//!
//! Resources never touch `reqwest` directly. They hand a path template, an
//! optional token and params to an [`ApiClient`], then pass the outcome back
//! through [`ApiClient::retrieve_data`] to unwrap the response envelope.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::HttpError;

/// Extra query/body parameters. `None` means the caller supplied nothing.
pub type Params = Option<Map<String, Value>>;

/// Top-level field of a successful body that holds an operation's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKey {
    Field(&'static str),
    /// `*`: hand back the whole body untouched.
    All,
}

impl EnvelopeKey {
    pub const IDENTITY: EnvelopeKey = EnvelopeKey::Field("identity");
    pub const IDENTITIES: EnvelopeKey = EnvelopeKey::Field("identities");
    pub const CONTACTS: EnvelopeKey = EnvelopeKey::Field("contacts");
}

impl fmt::Display for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKey::Field(name) => f.write_str(name),
            EnvelopeKey::All => f.write_str("*"),
        }
    }
}

/// Unwrap `outcome` by `key`.
///
/// Errors pass through verbatim. A successful body yields `body[key]`, or
/// the entire body for [`EnvelopeKey::All`].
///
/// ```
/// use idlink_http::{retrieve_data, EnvelopeKey};
/// use serde_json::json;
///
/// let body = json!({ "identity": { "identity_token": "abc" } });
/// let data = retrieve_data(Ok(body), EnvelopeKey::IDENTITY).unwrap();
/// assert_eq!(data, json!({ "identity_token": "abc" }));
/// ```
pub fn retrieve_data(outcome: Result<Value, HttpError>, key: EnvelopeKey) -> Result<Value, HttpError> {
    let body = outcome?;
    match key {
        EnvelopeKey::All => Ok(body),
        EnvelopeKey::Field(name) => match body {
            Value::Object(mut map) => map
                .remove(name)
                .ok_or(HttpError::MissingEnvelopeKey(name)),
            _ => Err(HttpError::MissingEnvelopeKey(name)),
        },
    }
}

/// Transport used by resource wrappers.
///
/// Every call issues exactly one request. Implementations own auth, base URL
/// and serialization.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError>;

    async fn put(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError>;

    async fn del(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError>;

    /// Envelope unwrapping applied to every outcome before it reaches the caller.
    fn retrieve_data(&self, outcome: Result<Value, HttpError>, key: EnvelopeKey) -> Result<Value, HttpError> {
        retrieve_data(outcome, key)
    }
}

#[async_trait]
impl<T: ApiClient + ?Sized> ApiClient for Arc<T> {
    async fn get(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).get(path, token, params).await
    }

    async fn put(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).put(path, token, params).await
    }

    async fn del(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).del(path, token, params).await
    }

    fn retrieve_data(&self, outcome: Result<Value, HttpError>, key: EnvelopeKey) -> Result<Value, HttpError> {
        (**self).retrieve_data(outcome, key)
    }
}

#[async_trait]
impl<'a, T: ApiClient + ?Sized> ApiClient for &'a T {
    async fn get(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).get(path, token, params).await
    }

    async fn put(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).put(path, token, params).await
    }

    async fn del(&self, path: &str, token: Option<&str>, params: Params) -> Result<Value, HttpError> {
        (**self).del(path, token, params).await
    }

    fn retrieve_data(&self, outcome: Result<Value, HttpError>, key: EnvelopeKey) -> Result<Value, HttpError> {
        (**self).retrieve_data(outcome, key)
    }
}
