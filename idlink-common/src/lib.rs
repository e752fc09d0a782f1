//! Pieces shared by idlink binaries and tests.
//!
//! - [`observability`]: centralised tracing/logging initialisation
pub mod observability;
