//! Crate-wide error taxonomy.
//!
//! Classification drives the HTTP edge behavior:
//!
//! - [`Error::Config`] — missing credentials/identifiers, detected before any
//!   network call, surfaced as a fixed 500 response.
//! - [`Error::Upstream`] / [`Error::Json`] — transport or payload failures;
//!   caught by the top-level handler and converted to the generic error page.
//! - [`Error::Decision`] — failures inside scoring/decision calls; same
//!   conversion, no partial output is ever emitted.
//!
//! Malformed candidate parameters (e.g. an unparseable `count`) are *not*
//! errors: they resolve locally via default substitution and never reach
//! this type.

use thiserror::Error;

/// Errors produced by the edge-compose pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid process configuration. Non-retryable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream or profile HTTP transport failure.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// A response body that should have been JSON was not.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure inside the decision engine collaborator.
    #[error("decision engine failure: {0}")]
    Decision(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
