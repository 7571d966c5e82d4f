//! Signal manifest.
//!
//! The manifest declares the scored signal dimensions the decision engine
//! maintains: each signal has an id, a strength awarded when its criteria
//! match, and an ordered list of criterion clauses over quirks and scores.
//!
//! The manifest is configuration, not request state: it is loaded once at
//! process start and shared read-only across requests.

use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::composition::criteria::CriterionClause;
use crate::error::Result;

/// Manifest shipped with the binary, used when `MANIFEST_PATH` is unset.
static DEFAULT_MANIFEST: Lazy<Arc<SignalManifest>> = Lazy::new(|| {
    Arc::new(
        serde_json::from_str(include_str!("default-manifest.json"))
            .expect("embedded default manifest is valid JSON"),
    )
});

/// Declarative manifest of scored signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalManifest {
    /// Signal definitions, evaluated independently.
    #[serde(default)]
    pub signals: Vec<SignalDefinition>,
}

/// A single scored signal dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal id (e.g. `isdevelopersignal`).
    pub id: String,
    /// Score awarded when the criteria match.
    #[serde(rename = "str", default = "default_strength")]
    pub strength: f64,
    /// Criterion clauses; all must match for the signal to fire.
    /// An empty list never fires (a signal with no trigger is inert).
    #[serde(default)]
    pub crit: Vec<CriterionClause>,
}

fn default_strength() -> f64 {
    50.0
}

impl SignalManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The embedded default manifest.
    pub fn default_manifest() -> Arc<SignalManifest> {
        Arc::clone(&DEFAULT_MANIFEST)
    }

    /// Look up a signal definition by id.
    pub fn signal(&self, id: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.id == id)
    }
}
