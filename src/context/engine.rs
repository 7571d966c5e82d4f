//! Decision engine boundary.
//!
//! The engine is the external collaborator that decides which candidate
//! variant wins. This module defines the call/return contract the tree
//! resolver depends on ([`DecisionEngine`]) and a default in-crate
//! implementation ([`ScoringEngine`]) so the service runs without a remote
//! engine. Test doubles implement the same trait with deterministic rules.
//!
//! The contract, not the scoring internals, is what replacement
//! implementations must honor:
//!
//! - `personalize` returns an ordered list of winners capped at `take`
//!   (empty input yields empty output, never an error) plus a flag saying
//!   whether true personalization occurred rather than a default fallback;
//! - `test` returns at most one bucketed variant.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::composition::criteria::{PersonalizationCriteria, TestVariantRef};
use crate::composition::node::{CompositionNode, PZ_CRITERIA_PARAM, TEST_VARIANT_PARAM};
use crate::context::manifest::SignalManifest;
use crate::context::quirks::Quirks;

/// Per-request visitor state: accumulated scores, quirks, and prior test
/// assignments. Owned by one request's [`DecisionContext`], never shared.
///
/// [`DecisionContext`]: crate::context::adapter::DecisionContext
#[derive(Debug, Clone, Default)]
pub struct VisitorState {
    /// Signal id → current score.
    pub scores: HashMap<String, f64>,
    /// Signal name → quirk value.
    pub quirks: Quirks,
    /// Test name → previously assigned variant id.
    pub assignments: HashMap<String, String>,
}

/// Arguments to a personalization decision.
#[derive(Debug)]
pub struct PersonalizeRequest<'a> {
    /// Tracking event name of the container.
    pub name: &'a str,
    /// Candidate variants in slot order (precedence order).
    pub variations: Vec<CompositionNode>,
    /// Maximum number of winners to return.
    pub take: usize,
    /// Scoring strategy identifier; `None` selects the engine default.
    pub algorithm: Option<&'a str>,
}

/// Result of a personalization decision.
#[derive(Debug)]
pub struct PersonalizeOutcome {
    /// Winning variants, ordered, at most `take` entries.
    pub variations: Vec<CompositionNode>,
    /// Whether any winner was chosen by criteria rather than as a default.
    pub personalized: bool,
}

/// Arguments to a test-bucketing decision.
#[derive(Debug)]
pub struct TestRequest<'a> {
    /// Test name of the container.
    pub name: &'a str,
    /// Test variants in slot order.
    pub variations: Vec<CompositionNode>,
}

/// The decision-engine contract consumed by the tree resolver.
pub trait DecisionEngine: Send + Sync {
    /// Seed visitor state from the opaque round-trip tokens. The token
    /// formats are engine-defined; callers pass them through unopened.
    fn initialize(&self, session_token: Option<&str>, quirk_token: Option<&str>) -> VisitorState;

    /// Fold quirks into the state and recompute scores. Must complete
    /// before any `personalize`/`test` call reads the state.
    fn apply_quirks(&self, state: &mut VisitorState, quirks: &Quirks);

    /// Choose winning personalization variants.
    fn personalize(&self, state: &VisitorState, request: PersonalizeRequest) -> PersonalizeOutcome;

    /// Choose at most one test variant.
    fn test(&self, state: &VisitorState, request: TestRequest) -> Option<CompositionNode>;
}

/// Algorithm id for single-score-cap personalization.
pub const ALGORITHM_SSC: &str = "ssc";

// ---------------------------------------------------------------------------
// Default implementation
// ---------------------------------------------------------------------------

/// Default manifest-driven scoring engine.
///
/// Token format: `~`-separated groups of `!`-separated `key-value` entries.
/// Session-token entries with numeric values seed visitor scores; the rest
/// are prior test assignments. Quirk-token entries are prior quirk values.
pub struct ScoringEngine {
    manifest: Arc<SignalManifest>,
}

impl ScoringEngine {
    pub fn new(manifest: Arc<SignalManifest>) -> Self {
        Self { manifest }
    }

    /// Top-down selection: walk candidates in precedence order, keep the
    /// ones whose criteria match, stop at `take`.
    fn personalize_top_down(
        &self,
        state: &VisitorState,
        variations: Vec<CompositionNode>,
        take: usize,
    ) -> PersonalizeOutcome {
        let mut winners = Vec::new();
        let mut personalized = false;

        for node in variations {
            if winners.len() >= take {
                break;
            }
            let criteria = candidate_criteria(&node);
            if criteria.matches(&state.scores, &state.quirks) {
                personalized |= !criteria.is_default();
                winners.push(node);
            }
        }

        PersonalizeOutcome {
            variations: winners,
            personalized,
        }
    }

    /// Single-score-cap selection: rank candidates by the current score of
    /// their declared dimension, highest positive score first; candidates
    /// without a dimension act as defaults when nothing scores.
    fn personalize_ssc(
        &self,
        state: &VisitorState,
        variations: Vec<CompositionNode>,
        take: usize,
    ) -> PersonalizeOutcome {
        let mut scored: Vec<(f64, usize, CompositionNode)> = Vec::new();
        let mut defaults: Vec<CompositionNode> = Vec::new();

        for (index, node) in variations.into_iter().enumerate() {
            let criteria = candidate_criteria(&node);
            match criteria.dim.as_deref() {
                Some(dim) => {
                    let score = state.scores.get(dim).copied().unwrap_or(0.0);
                    if score > 0.0 && criteria.matches(&state.scores, &state.quirks) {
                        scored.push((score, index, node));
                    }
                }
                None => defaults.push(node),
            }
        }

        if scored.is_empty() {
            defaults.truncate(take);
            return PersonalizeOutcome {
                variations: defaults,
                personalized: false,
            };
        }

        // Highest score wins; slot order breaks ties.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        scored.truncate(take);

        PersonalizeOutcome {
            variations: scored.into_iter().map(|(_, _, node)| node).collect(),
            personalized: true,
        }
    }
}

impl DecisionEngine for ScoringEngine {
    fn initialize(&self, session_token: Option<&str>, quirk_token: Option<&str>) -> VisitorState {
        let mut state = VisitorState::default();

        if let Some(token) = session_token {
            for (key, value) in token_entries(token) {
                match value.parse::<f64>() {
                    Ok(score) => {
                        state.scores.insert(key, score);
                    }
                    Err(_) => {
                        state.assignments.insert(key, value);
                    }
                }
            }
        }

        if let Some(token) = quirk_token {
            for (key, value) in token_entries(token) {
                state.quirks.insert(key, value);
            }
        }

        state
    }

    fn apply_quirks(&self, state: &mut VisitorState, quirks: &Quirks) {
        state.quirks.extend(quirks.clone());

        // Re-evaluate manifest signals against the updated quirks. A
        // triggered strength never lowers a score already carried in.
        for signal in &self.manifest.signals {
            if signal.crit.is_empty() {
                continue;
            }
            if signal.crit.iter().all(|c| c.matches(&state.scores, &state.quirks)) {
                let entry = state.scores.entry(signal.id.clone()).or_insert(0.0);
                *entry = entry.max(signal.strength);
            }
        }
    }

    fn personalize(&self, state: &VisitorState, request: PersonalizeRequest) -> PersonalizeOutcome {
        if request.variations.is_empty() {
            return PersonalizeOutcome {
                variations: Vec::new(),
                personalized: false,
            };
        }

        match request.algorithm {
            Some(ALGORITHM_SSC) => self.personalize_ssc(state, request.variations, request.take),
            _ => self.personalize_top_down(state, request.variations, request.take),
        }
    }

    fn test(&self, state: &VisitorState, request: TestRequest) -> Option<CompositionNode> {
        if request.variations.is_empty() {
            return None;
        }

        // Sticky assignment carried in the session token wins.
        if let Some(assigned) = state.assignments.get(request.name) {
            if let Some(node) = request
                .variations
                .iter()
                .find(|v| variant_id(v).as_deref() == Some(assigned))
            {
                return Some(node.clone());
            }
        }

        // Otherwise bucket deterministically by test name.
        let mut hasher = DefaultHasher::new();
        request.name.hash(&mut hasher);
        let index = (hasher.finish() as usize) % request.variations.len();
        request.variations.into_iter().nth(index)
    }
}

/// Criteria attached to a candidate; a candidate without `$pzCrit` (or with
/// an unreadable one) is treated as an unconditional default.
fn candidate_criteria(node: &CompositionNode) -> PersonalizationCriteria {
    node.parameters
        .get(PZ_CRITERIA_PARAM)
        .and_then(|p| serde_json::from_value(p.value.clone()).ok())
        .unwrap_or_default()
}

/// Variant id carried by `$tstVrnt`, if readable.
fn variant_id(node: &CompositionNode) -> Option<String> {
    node.parameters
        .get(TEST_VARIANT_PARAM)
        .and_then(|p| serde_json::from_value::<TestVariantRef>(p.value.clone()).ok())
        .map(|v| v.id)
}

/// Parse a round-trip token into `(key, value)` entries: `~`-separated
/// groups of `!`-separated entries, each split on its last `-`.
fn token_entries(token: &str) -> Vec<(String, String)> {
    token
        .split('~')
        .flat_map(|group| group.split('!'))
        .filter_map(|entry| {
            let (key, value) = entry.rsplit_once('-')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(SignalManifest::default_manifest())
    }

    fn candidate(title: &str, crit: serde_json::Value) -> CompositionNode {
        serde_json::from_value(json!({
            "type": "hero",
            "parameters": {
                "title": { "type": "text", "value": title },
                "$pzCrit": { "type": "$pzCrit", "value": crit }
            }
        }))
        .unwrap()
    }

    fn test_variant(title: &str, id: &str) -> CompositionNode {
        serde_json::from_value(json!({
            "type": "hero",
            "parameters": {
                "title": { "type": "text", "value": title },
                "$tstVrnt": { "type": "testVariant", "value": { "id": id } }
            }
        }))
        .unwrap()
    }

    fn title(node: &CompositionNode) -> &str {
        node.parameter_str("title").unwrap()
    }

    #[test]
    fn test_session_token_seeds_scores_and_assignments() {
        let state = engine().initialize(
            Some("mytest-var1!mytest2-var2~ses1-x!ses2-1~vis1-fa~isdevelopersignal-10"),
            None,
        );
        assert_eq!(state.scores["isdevelopersignal"], 10.0);
        assert_eq!(state.scores["ses2"], 1.0);
        assert_eq!(state.assignments["mytest"], "var1");
        assert_eq!(state.assignments["mytest2"], "var2");
    }

    #[test]
    fn test_quirk_token_seeds_quirks() {
        let state = engine().initialize(None, Some("role-developer"));
        assert_eq!(state.quirks["role"], "developer");
    }

    #[test]
    fn test_apply_quirks_triggers_manifest_signal() {
        let eng = engine();
        let mut state = eng.initialize(Some("isdevelopersignal-10"), None);
        eng.apply_quirks(&mut state, &[("role".to_string(), "developer".to_string())].into());
        // triggered strength (50) outweighs the carried-in score (10)
        assert_eq!(state.scores["isdevelopersignal"], 50.0);
        assert_eq!(state.quirks["role"], "developer");
    }

    #[test]
    fn test_top_down_picks_first_matching_candidate() {
        let eng = engine();
        let mut state = VisitorState::default();
        state.scores.insert("isdevelopersignal".to_string(), 50.0);

        let outcome = eng.personalize(
            &state,
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("dev", json!({ "crit": [{ "l": "isdevelopersignal", "op": ">", "r": "10" }] })),
                    candidate("mkt", json!({ "crit": [{ "l": "ismarketersignal", "op": ">", "r": "10" }] })),
                    candidate("default", json!({ "crit": [] })),
                ],
                take: 1,
                algorithm: None,
            },
        );

        assert_eq!(outcome.variations.len(), 1);
        assert_eq!(title(&outcome.variations[0]), "dev");
        assert!(outcome.personalized);
    }

    #[test]
    fn test_top_down_falls_back_to_default_without_personalizing() {
        let eng = engine();
        let outcome = eng.personalize(
            &VisitorState::default(),
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("dev", json!({ "crit": [{ "l": "isdevelopersignal", "op": ">", "r": "10" }] })),
                    candidate("default", json!({ "crit": [] })),
                ],
                take: 1,
                algorithm: None,
            },
        );
        assert_eq!(title(&outcome.variations[0]), "default");
        assert!(!outcome.personalized);
    }

    #[test]
    fn test_top_down_no_match_no_default_yields_empty() {
        let eng = engine();
        let outcome = eng.personalize(
            &VisitorState::default(),
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("dev", json!({ "crit": [{ "l": "isdevelopersignal", "op": ">", "r": "10" }] })),
                    candidate("mkt", json!({ "crit": [{ "l": "ismarketersignal", "op": ">", "r": "10" }] })),
                ],
                take: 1,
                algorithm: None,
            },
        );
        assert!(outcome.variations.is_empty());
        assert!(!outcome.personalized);
    }

    #[test]
    fn test_top_down_preserves_order_across_multiple_winners() {
        let eng = engine();
        let mut state = VisitorState::default();
        state.scores.insert("sig".to_string(), 100.0);

        let matching = json!({ "crit": [{ "l": "sig", "op": ">", "r": "1" }] });
        let outcome = eng.personalize(
            &state,
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("a", matching.clone()),
                    candidate("b", matching.clone()),
                    candidate("c", matching),
                ],
                take: 3,
                algorithm: None,
            },
        );
        let titles: Vec<_> = outcome.variations.iter().map(title).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[test]
    fn test_take_caps_winners() {
        let eng = engine();
        let matching = json!({ "crit": [] });
        let outcome = eng.personalize(
            &VisitorState::default(),
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("a", matching.clone()),
                    candidate("b", matching.clone()),
                    candidate("c", matching),
                ],
                take: 2,
                algorithm: None,
            },
        );
        assert_eq!(outcome.variations.len(), 2);
    }

    #[test]
    fn test_empty_variations_yield_empty_outcome() {
        let eng = engine();
        let outcome = eng.personalize(
            &VisitorState::default(),
            PersonalizeRequest {
                name: "pz",
                variations: Vec::new(),
                take: 1,
                algorithm: None,
            },
        );
        assert!(outcome.variations.is_empty());
    }

    #[test]
    fn test_ssc_picks_highest_scored_dimension() {
        let eng = engine();
        let mut state = VisitorState::default();
        state.scores.insert("isdevelopersignal".to_string(), 50.0);
        state.scores.insert("ismarketersignal".to_string(), 20.0);

        let outcome = eng.personalize(
            &state,
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("mkt", json!({ "dim": "ismarketersignal" })),
                    candidate("dev", json!({ "dim": "isdevelopersignal" })),
                    candidate("default", json!({})),
                ],
                take: 1,
                algorithm: Some(ALGORITHM_SSC),
            },
        );
        assert_eq!(title(&outcome.variations[0]), "dev");
        assert!(outcome.personalized);
    }

    #[test]
    fn test_ssc_falls_back_to_default_when_nothing_scores() {
        let eng = engine();
        let outcome = eng.personalize(
            &VisitorState::default(),
            PersonalizeRequest {
                name: "pz",
                variations: vec![
                    candidate("dev", json!({ "dim": "isdevelopersignal" })),
                    candidate("default", json!({})),
                ],
                take: 1,
                algorithm: Some(ALGORITHM_SSC),
            },
        );
        assert_eq!(title(&outcome.variations[0]), "default");
        assert!(!outcome.personalized);
    }

    #[test]
    fn test_sticky_assignment_wins_bucketing() {
        let eng = engine();
        let state = eng.initialize(Some("mytest-var1"), None);

        let chosen = eng
            .test(
                &state,
                TestRequest {
                    name: "mytest",
                    variations: vec![test_variant("one", "var1"), test_variant("two", "var2")],
                },
            )
            .unwrap();
        assert_eq!(title(&chosen), "one");
    }

    #[test]
    fn test_bucketing_is_deterministic_per_name() {
        let eng = engine();
        let state = VisitorState::default();
        let variations =
            || vec![test_variant("one", "var1"), test_variant("two", "var2")];

        let first = eng
            .test(&state, TestRequest { name: "t", variations: variations() })
            .unwrap();
        let second = eng
            .test(&state, TestRequest { name: "t", variations: variations() })
            .unwrap();
        assert_eq!(title(&first), title(&second));
    }

    #[test]
    fn test_empty_test_variations_yield_none() {
        let eng = engine();
        assert!(eng
            .test(&VisitorState::default(), TestRequest { name: "t", variations: Vec::new() })
            .is_none());
    }
}
