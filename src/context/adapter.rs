//! Per-request decision context.
//!
//! [`DecisionContext`] wraps a [`DecisionEngine`] for the lifetime of one
//! request: it seeds visitor state from the round-trip tokens, folds in the
//! extracted quirks, and exposes the two decision operations the tree
//! resolver calls. Consent is enabled by default; there is no consent-gating
//! flow at this layer.
//!
//! Quirks must be applied before the first decision call — scoring reads
//! the just-applied quirks. The type makes this hard to get wrong:
//! construction takes the quirks up front.

use std::sync::Arc;

use crate::composition::node::{ComponentParameter, CompositionNode};
use crate::context::engine::{
    DecisionEngine, PersonalizeOutcome, PersonalizeRequest, TestRequest, VisitorState,
};
use crate::context::quirks::{Quirks, SessionTokens};

/// What a missing `count` parameter means on a personalization container.
///
/// Historical deployments disagreed: one treated absence as "take exactly
/// one", another as "take every matching variation". Both are supported;
/// the crate default is [`MissingCountPolicy::One`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCountPolicy {
    /// Absent `count` requests exactly one winner.
    #[default]
    One,
    /// Absent `count` requests every matching variation.
    All,
}

/// Per-request wrapper over the decision engine.
pub struct DecisionContext {
    engine: Arc<dyn DecisionEngine>,
    state: VisitorState,
}

impl DecisionContext {
    /// Initialize a context from prior tokens, then apply the request's
    /// quirks so subsequent decisions see them.
    pub fn initialize(
        engine: Arc<dyn DecisionEngine>,
        tokens: &SessionTokens,
        quirks: &Quirks,
    ) -> Self {
        let mut state = engine.initialize(tokens.session.as_deref(), tokens.quirk.as_deref());
        engine.apply_quirks(&mut state, quirks);
        Self { engine, state }
    }

    /// Fold additional quirks into the state.
    pub fn apply_quirks(&mut self, quirks: &Quirks) {
        self.engine.apply_quirks(&mut self.state, quirks);
    }

    /// Current visitor state, for diagnostics.
    pub fn state(&self) -> &VisitorState {
        &self.state
    }

    /// Choose winning personalization variants.
    pub fn personalize(
        &self,
        name: &str,
        variations: Vec<CompositionNode>,
        take: usize,
        algorithm: Option<&str>,
    ) -> PersonalizeOutcome {
        self.engine.personalize(
            &self.state,
            PersonalizeRequest {
                name,
                variations,
                take,
                algorithm,
            },
        )
    }

    /// Choose at most one test variant.
    pub fn test(&self, name: &str, variations: Vec<CompositionNode>) -> Option<CompositionNode> {
        self.engine.test(&self.state, TestRequest { name, variations })
    }
}

/// Resolve a container's `count` parameter into a take limit.
///
/// The policy, reproduced exactly:
/// - absent → 1 under [`MissingCountPolicy::One`], `available` under
///   [`MissingCountPolicy::All`];
/// - numeric string → parsed integer; parse failure → 1;
/// - number → used verbatim, except `0` falls back to 1 (falsy coalescing,
///   a deliberate historical behavior) and negatives clamp to 0;
/// - any other type → 1.
pub fn parse_take(
    count: Option<&ComponentParameter>,
    policy: MissingCountPolicy,
    available: usize,
) -> usize {
    let Some(count) = count else {
        return match policy {
            MissingCountPolicy::One => 1,
            MissingCountPolicy::All => available,
        };
    };

    match &count.value {
        serde_json::Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => n.max(0) as usize,
            Err(_) => 1,
        },
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(0) | None => 1,
            Some(n) => n.max(0) as usize,
        },
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn count(value: Value) -> ComponentParameter {
        ComponentParameter {
            param_type: "number".to_string(),
            value,
        }
    }

    #[test]
    fn test_absent_count_policy_one() {
        assert_eq!(parse_take(None, MissingCountPolicy::One, 5), 1);
    }

    #[test]
    fn test_absent_count_policy_all() {
        assert_eq!(parse_take(None, MissingCountPolicy::All, 5), 5);
    }

    #[test]
    fn test_numeric_string_parses() {
        assert_eq!(parse_take(Some(&count(json!("3"))), MissingCountPolicy::One, 5), 3);
        assert_eq!(parse_take(Some(&count(json!(" 2 "))), MissingCountPolicy::One, 5), 2);
    }

    #[test]
    fn test_unparseable_string_falls_back_to_one() {
        assert_eq!(parse_take(Some(&count(json!("lots"))), MissingCountPolicy::One, 5), 1);
        assert_eq!(parse_take(Some(&count(json!(""))), MissingCountPolicy::All, 5), 1);
    }

    #[test]
    fn test_number_used_verbatim() {
        assert_eq!(parse_take(Some(&count(json!(4))), MissingCountPolicy::One, 5), 4);
    }

    #[test]
    fn test_numeric_zero_falsy_coalesces_to_one() {
        assert_eq!(parse_take(Some(&count(json!(0))), MissingCountPolicy::One, 5), 1);
        assert_eq!(parse_take(Some(&count(json!(0))), MissingCountPolicy::All, 5), 1);
    }

    #[test]
    fn test_other_types_default_to_one() {
        assert_eq!(parse_take(Some(&count(json!(true))), MissingCountPolicy::One, 5), 1);
        assert_eq!(parse_take(Some(&count(json!({ "n": 3 }))), MissingCountPolicy::One, 5), 1);
        assert_eq!(parse_take(Some(&count(json!(null))), MissingCountPolicy::One, 5), 1);
    }

    #[test]
    fn test_negative_number_clamps_to_zero() {
        assert_eq!(parse_take(Some(&count(json!(-2))), MissingCountPolicy::One, 5), 0);
    }
}
