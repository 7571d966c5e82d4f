//! HTTP server for the composition resolution proxy.
//!
//! # Endpoints
//!
//! - `GET /health` — liveness probe
//! - everything else — proxied through the resolution pipeline

pub mod routes;

pub use routes::{app_router, AppState};
