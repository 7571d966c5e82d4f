//! Reserved-parameter payloads on candidate variants.
//!
//! Personalization candidates carry a `$pzCrit` parameter: an optional
//! primary signal dimension, an ordered list of criterion clauses, and a
//! human-readable label. A candidate whose clause list is empty is the
//! default/fallback candidate and matches unconditionally.
//!
//! Test variants carry a `$tstVrnt` parameter holding the variant id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparator used by a criterion clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
}

/// A single criterion clause: left-hand signal or quirk, comparator,
/// right-hand value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionClause {
    /// Left-hand side: a signal name, or a quirk name when `t` is `"q"`.
    pub l: String,
    /// Comparator.
    pub op: Comparator,
    /// Right-hand value. The wire format uses strings even for numbers.
    pub r: Value,
    /// Left-hand target: `"q"` compares against a quirk instead of a score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl CriterionClause {
    /// Whether the left-hand side targets a quirk rather than a signal score.
    pub fn targets_quirk(&self) -> bool {
        self.t.as_deref() == Some("q")
    }

    /// Evaluate this clause against visitor scores and quirks.
    ///
    /// Score comparisons are numeric; a missing score counts as 0 and an
    /// unparseable right-hand side never matches. Quirk comparisons are
    /// string equality for `=`/`!=`; ordering comparators on quirks match
    /// only when both sides parse as numbers.
    pub fn matches(&self, scores: &HashMap<String, f64>, quirks: &HashMap<String, String>) -> bool {
        if self.targets_quirk() {
            let Some(left) = quirks.get(&self.l) else {
                return self.op == Comparator::NotEquals;
            };
            let right = value_as_string(&self.r);
            match self.op {
                Comparator::Equals => *left == right,
                Comparator::NotEquals => *left != right,
                _ => match (left.parse::<f64>(), right.parse::<f64>()) {
                    (Ok(l), Ok(r)) => compare(self.op, l, r),
                    _ => false,
                },
            }
        } else {
            let left = scores.get(&self.l).copied().unwrap_or(0.0);
            match value_as_f64(&self.r) {
                Some(right) => compare(self.op, left, right),
                None => false,
            }
        }
    }
}

fn compare(op: Comparator, left: f64, right: f64) -> bool {
    match op {
        Comparator::GreaterThan => left > right,
        Comparator::GreaterOrEqual => left >= right,
        Comparator::LessThan => left < right,
        Comparator::LessOrEqual => left <= right,
        Comparator::Equals => left == right,
        Comparator::NotEquals => left != right,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Audience-matching criteria attached to a personalization candidate
/// via the `$pzCrit` parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationCriteria {
    /// Primary signal dimension, used by score-ranking algorithms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<String>,
    /// Ordered criterion clauses; all must match. Empty means default.
    #[serde(default)]
    pub crit: Vec<CriterionClause>,
    /// Human-readable label for analytics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PersonalizationCriteria {
    /// A default/fallback candidate: no clauses and no dimension.
    pub fn is_default(&self) -> bool {
        self.crit.is_empty() && self.dim.is_none()
    }

    /// All clauses match (vacuously true for an empty list).
    pub fn matches(&self, scores: &HashMap<String, f64>, quirks: &HashMap<String, String>) -> bool {
        self.crit.iter().all(|c| c.matches(scores, quirks))
    }
}

/// Test variant identity carried by the `$tstVrnt` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVariantRef {
    /// Variant id as assigned in the test definition.
    pub id: String,
}
