//! edge-compose HTTP server binary.
//!
//! Starts the axum proxy that resolves composition route responses.
//!
//! # Environment Variables
//!
//! - `UNIFORM_API_KEY` — content API key (required)
//! - `UNIFORM_PROJECT_ID` — project identifier (required)
//! - `SEGMENT_API_KEY` / `SEGMENT_SPACE_ID` — profile lookup credentials (optional)
//! - `UPSTREAM_HOST` — content API host (default: uniform.global)
//! - `MANIFEST_PATH` — signal manifest JSON file (default: embedded manifest)
//! - `PORT` — HTTP port (default: 8080)
//! - `RUST_LOG` — tracing filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context as _;

use edge_compose::composition::resolver::ResolverOptions;
use edge_compose::config::Config;
use edge_compose::context::engine::ScoringEngine;
use edge_compose::context::manifest::SignalManifest;
use edge_compose::profile::ProfileClient;
use edge_compose::server::{app_router, AppState};
use edge_compose::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edge_compose=debug".into()),
        )
        .init();

    // Configuration is validated before any network call is made.
    let config = Config::from_env().context("loading configuration")?;

    // The signal manifest is loaded once and shared read-only.
    let manifest = match &config.manifest_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading manifest from {}", path))?;
            Arc::new(SignalManifest::from_json(&json).context("parsing manifest")?)
        }
        None => SignalManifest::default_manifest(),
    };
    tracing::info!(signals = manifest.signals.len(), "signal manifest loaded");

    let http = reqwest::Client::new();
    let state = AppState {
        upstream: Arc::new(UpstreamClient::new(
            http.clone(),
            config.upstream_host.clone(),
            config.api_key.clone(),
            config.project_id.clone(),
        )),
        traits: Arc::new(ProfileClient::new(
            http,
            config.profile_space_id.clone(),
            config.profile_api_key.clone(),
        )),
        engine: Arc::new(ScoringEngine::new(manifest)),
        options: ResolverOptions::default(),
    };

    let app = app_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);

    tracing::info!("edge-compose starting on {}", bind_addr);
    tracing::info!("  GET /health — liveness probe");
    tracing::info!("  *           — composition resolution proxy ({})", config.upstream_host);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;

    axum::serve(listener, app).await.context("server failed")?;

    Ok(())
}
