//! Identity operations for the identity-management API.
//!
//! [`IdentityResource`] wraps any [`idlink_http::ApiClient`]: synchronize,
//! get, list, contacts, delete and relink, each one request and one result.
pub mod resource;

pub use resource::IdentityResource;
