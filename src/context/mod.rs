//! Visitor context: quirk extraction, the signal manifest, and the
//! decision-engine boundary.

pub mod adapter;
pub mod engine;
pub mod manifest;
pub mod quirks;

pub use adapter::{DecisionContext, MissingCountPolicy};
pub use engine::{DecisionEngine, ScoringEngine};
pub use manifest::SignalManifest;
