//! Process configuration.
//!
//! All configuration is read from environment variables once at startup and
//! shared read-only for the lifetime of the process.
//!
//! # Environment Variables
//!
//! - `UNIFORM_API_KEY` — content API key (required)
//! - `UNIFORM_PROJECT_ID` — project identifier appended to upstream requests (required)
//! - `SEGMENT_API_KEY` — profile API key (optional; trait lookup disabled without it)
//! - `SEGMENT_SPACE_ID` — profile space identifier (optional)
//! - `UPSTREAM_HOST` — content API host (default: `uniform.global`)
//! - `MANIFEST_PATH` — signal manifest JSON file (default: embedded manifest)
//! - `PORT` — HTTP port (default: 8080)

use std::env;

use crate::error::{Error, Result};

/// Default content API host.
pub const DEFAULT_UPSTREAM_HOST: &str = "uniform.global";

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent to the content API as `x-api-key`.
    pub api_key: String,
    /// Project identifier appended as the `projectId` query parameter.
    pub project_id: String,
    /// Profile API key; `None` disables the trait lookup.
    pub profile_api_key: Option<String>,
    /// Profile space identifier; `None` disables the trait lookup.
    pub profile_space_id: Option<String>,
    /// Content API host (scheme is always https).
    pub upstream_host: String,
    /// Optional path to a signal manifest JSON file.
    pub manifest_path: Option<String>,
    /// HTTP listen port.
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Missing required values are a configuration error and must be
    /// reported before any network call is made.
    pub fn from_env() -> Result<Self> {
        let api_key = require("UNIFORM_API_KEY")?;
        let project_id = require("UNIFORM_PROJECT_ID")?;

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        Ok(Self {
            api_key,
            project_id,
            profile_api_key: optional("SEGMENT_API_KEY"),
            profile_space_id: optional("SEGMENT_SPACE_ID"),
            upstream_host: env::var("UPSTREAM_HOST")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_HOST.to_string()),
            manifest_path: optional("MANIFEST_PATH"),
            port,
        })
    }
}

fn require(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!("{} is not set", name))),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
