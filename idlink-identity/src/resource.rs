//! The `identities` resource of the identity API.
//!
//! Each operation shapes one request (path template, token, params), hands it
//! to the [`ApiClient`] and unwraps the response envelope through the same
//! client. Nothing is cached or retried, and no state survives a call.
use idlink_http::{ApiClient, EnvelopeKey, HttpError, Params};
use serde_json::{Map, Value, json};

const IDENTITIES_PATH: &str = "identities";
const IDENTITY_PATH: &str = "identities/@token";
const SYNCHRONIZE_PATH: &str = "identities/@token/synchronize";
const CONTACTS_PATH: &str = "identities/@token/contacts";
const LINK_PATH: &str = "identities/@token/link";

/// Identity operations bound to an API collaborator.
///
/// The collaborator is owned, so share one transport across resources by
/// passing an `Arc<HttpClient>` or a `&HttpClient`.
#[derive(Clone, Debug)]
pub struct IdentityResource<A> {
    api: A,
}

impl<A: ApiClient> IdentityResource<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Refresh an identity from its underlying social network profile.
    pub async fn synchronize(&self, token: &str) -> Result<Value, HttpError> {
        tracing::debug!(identity_token = %token, "identity.synchronize");
        let outcome = self
            .api
            .put(SYNCHRONIZE_PATH, Some(token), Some(Map::new()))
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::IDENTITY)
    }

    /// Fetch the details of one identity.
    pub async fn get(&self, identity_token: &str) -> Result<Value, HttpError> {
        tracing::debug!(identity_token = %identity_token, "identity.get");
        let outcome = self
            .api
            .get(IDENTITY_PATH, Some(identity_token), Some(Map::new()))
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::IDENTITY)
    }

    /// One page of the identities listing.
    pub async fn get_all(&self, page: u32) -> Result<Value, HttpError> {
        tracing::debug!(page, "identity.get_all");
        let outcome = self
            .api
            .get(IDENTITIES_PATH, None, object(json!({ "page": page })))
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::IDENTITIES)
    }

    /// Social network contacts of an identity, without extra options.
    ///
    /// The collaborator receives no params at all, which is what an omitted
    /// options bag means on the wire.
    pub async fn get_contacts(&self, identity_token: &str) -> Result<Value, HttpError> {
        self.contacts(identity_token, None).await
    }

    /// Social network contacts of an identity, with options passed through
    /// verbatim as query parameters (e.g. `disable_cache`).
    pub async fn get_contacts_with(
        &self,
        identity_token: &str,
        options: Map<String, Value>,
    ) -> Result<Value, HttpError> {
        self.contacts(identity_token, Some(options)).await
    }

    async fn contacts(&self, identity_token: &str, options: Params) -> Result<Value, HttpError> {
        tracing::debug!(
            identity_token = %identity_token,
            has_options = options.is_some(),
            "identity.get_contacts"
        );
        let outcome = self
            .api
            .get(CONTACTS_PATH, Some(identity_token), options)
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::CONTACTS)
    }

    /// Delete an identity. Deletion is always confirmed.
    pub async fn del(&self, identity_token: &str) -> Result<Value, HttpError> {
        tracing::debug!(identity_token = %identity_token, "identity.del");
        let outcome = self
            .api
            .del(
                IDENTITY_PATH,
                Some(identity_token),
                object(json!({ "confirm_deletion": "true" })),
            )
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::IDENTITY)
    }

    /// Move an identity to another user. The whole response body is returned.
    pub async fn re_link(&self, identity_token: &str, user_token: &str) -> Result<Value, HttpError> {
        tracing::debug!(
            identity_token = %identity_token,
            user_token = %user_token,
            "identity.re_link"
        );
        let body = json!({
            "user": {
                "user_token": user_token
            }
        });
        let outcome = self
            .api
            .put(LINK_PATH, Some(identity_token), object(body))
            .await;
        self.api.retrieve_data(outcome, EnvelopeKey::All)
    }
}

fn object(v: Value) -> Params {
    match v {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
