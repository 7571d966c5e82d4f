//! Composition tree wire types.
//!
//! A composition is a tree of renderable components returned by the content
//! API. Nodes carry a `type` discriminant, a `parameters` map of
//! `{ type, value }` pairs, and a `slots` map of named, ordered child lists.
//! Slot order is significant: it determines render order and, for
//! personalization containers, candidate precedence.
//!
//! Fields this crate does not model (`_id`, `_name`, engine bookkeeping
//! attached to variants, ...) are preserved through a flattened map so that
//! pass-through output stays faithful and sanitization can strip reserved
//! keys without disturbing anything else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type of a personalization container.
pub const PERSONALIZE_TYPE: &str = "$personalization";
/// Slot holding a personalization container's candidate variants.
pub const PERSONALIZE_SLOT: &str = "pz";
/// Reserved candidate parameter carrying audience-matching criteria.
pub const PZ_CRITERIA_PARAM: &str = "$pzCrit";

/// Node type of an A/B-test container.
pub const TEST_TYPE: &str = "$test";
/// Slot holding a test container's variants.
pub const TEST_SLOT: &str = "test";
/// Reserved variant parameter carrying the test variant id.
pub const TEST_VARIANT_PARAM: &str = "$tstVrnt";

/// A single component parameter: a declared type plus an arbitrary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentParameter {
    /// Declared parameter type (e.g. `text`, `number`, `$pzCrit`).
    #[serde(rename = "type")]
    pub param_type: String,
    /// Parameter value; strings, numbers, or structured objects.
    pub value: Value,
}

/// A node in a composition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionNode {
    /// Node discriminant: `$personalization`, `$test`, or a component type.
    #[serde(rename = "type")]
    pub node_type: String,

    /// Named parameters. Key order is not significant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ComponentParameter>,

    /// Named slots of ordered children. Child order is significant.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, Vec<CompositionNode>>,

    /// Everything else on the node, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompositionNode {
    /// Create a bare node of the given type.
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            parameters: BTreeMap::new(),
            slots: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Whether this node is a personalization or test container.
    pub fn is_container(&self) -> bool {
        self.node_type == PERSONALIZE_TYPE || self.node_type == TEST_TYPE
    }

    /// String value of a parameter, if present and a string.
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(|p| p.value.as_str())
    }

    /// Remove and return this node's children for a slot.
    pub fn take_slot(&mut self, slot: &str) -> Vec<CompositionNode> {
        self.slots.remove(slot).unwrap_or_default()
    }
}

/// The `compositionApiResponse` envelope of a composition route payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionApiResponse {
    /// Root of the composition tree.
    pub composition: CompositionNode,
    /// Project/state/timestamps metadata, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A route response with the `composition` discriminant.
///
/// Non-composition route responses are never deserialized into this type;
/// the orchestrator inspects the raw payload's `type` field first and passes
/// anything else through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionRoute {
    /// Discriminant; always `"composition"` for this type.
    #[serde(rename = "type")]
    pub route_type: String,

    /// Composition payload.
    #[serde(rename = "compositionApiResponse")]
    pub composition_api_response: CompositionApiResponse,

    /// Matched route, dynamic inputs, and any other envelope fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Discriminant value identifying a composition route response.
pub const COMPOSITION_ROUTE_TYPE: &str = "composition";

/// Check whether a raw route payload is a composition response.
pub fn is_composition_payload(payload: &Value) -> bool {
    payload.get("type").and_then(Value::as_str) == Some(COMPOSITION_ROUTE_TYPE)
}
