//! # edge-compose
//!
//! An HTTP edge proxy in front of a content-delivery API that returns page
//! compositions (trees of renderable components). The proxy fetches the
//! composition, resolves personalization and A/B-test containers into
//! concrete components against a decision engine, strips internal
//! bookkeeping from the result, and serializes it back to the client.
//! Non-composition responses pass through untouched.
//!
//! Core pieces, leaf first:
//!
//! - [`context::quirks`] — signal extraction from headers and cookies
//! - [`context::adapter`] — the per-request decision context
//! - [`composition::resolver`] — the tree resolution engine
//! - [`server`] — the request orchestrator

pub mod composition;
pub mod config;
pub mod context;
pub mod error;
pub mod profile;
pub mod server;
pub mod upstream;

pub use composition::{CompositionNode, CompositionRoute, TreeResolver};
pub use context::{DecisionContext, DecisionEngine, ScoringEngine, SignalManifest};
pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
