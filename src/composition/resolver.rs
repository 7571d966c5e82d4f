//! Tree resolver: the composition resolution engine.
//!
//! A single depth-first traversal visits every node. Personalization and
//! test containers are resolved into zero or more plain component nodes;
//! everything else is kept, with recursion continuing into its slots so
//! containers nested inside ordinary components still resolve.
//!
//! Visiting a node yields a structural edit ([`NodeEdit`]) which the
//! traversal driver applies while rebuilding the parent slot. Each
//! container's edit is atomic relative to its own position: edits never
//! reference slot indices computed before an earlier sibling's insertion
//! or removal, so multiple containers in one slot cannot corrupt each
//! other.
//!
//! Invariants on the output tree:
//! - no `$personalization` / `$test` discriminant survives;
//! - emitted variants carry no `$pzCrit` / `$tstVrnt` parameter and no
//!   engine bookkeeping fields;
//! - untouched slots keep their child order, resolved slots keep the
//!   engine's returned order.

use std::collections::VecDeque;

use crate::composition::node::{
    CompositionNode, PERSONALIZE_SLOT, PERSONALIZE_TYPE, PZ_CRITERIA_PARAM, TEST_SLOT,
    TEST_TYPE, TEST_VARIANT_PARAM,
};
use crate::context::adapter::{parse_take, DecisionContext, MissingCountPolicy};

/// Tracking event name used when a personalization container has none.
pub const DEFAULT_PERSONALIZATION_NAME: &str = "Untitled Personalization";
/// Test name used when a test container has none.
pub const DEFAULT_TEST_NAME: &str = "Untitled Test";

/// Engine bookkeeping fields stripped from emitted personalization variants.
const VARIANT_BOOKKEEPING_FIELDS: [&str; 3] = ["pz", "control", "id"];

/// Structural edit for one visited node, applied by the traversal driver.
#[derive(Debug)]
enum NodeEdit {
    /// Leave the node in place.
    Keep,
    /// Replace the node with zero or more nodes, in order.
    ReplaceWith(Vec<CompositionNode>),
    /// Remove the node entirely.
    Remove,
}

/// Traversal options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Interpretation of a missing `count` parameter.
    pub missing_count: MissingCountPolicy,
}

/// Resolves all containers in a composition tree against a ready context.
pub struct TreeResolver<'a> {
    context: &'a DecisionContext,
    options: ResolverOptions,
}

impl<'a> TreeResolver<'a> {
    pub fn new(context: &'a DecisionContext) -> Self {
        Self {
            context,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(context: &'a DecisionContext, options: ResolverOptions) -> Self {
        Self { context, options }
    }

    /// Resolve every container reachable from `root`, in place.
    pub fn resolve(&self, root: &mut CompositionNode) {
        self.resolve_slots(root);
    }

    /// Rebuild each slot of `node` by visiting its children in order.
    ///
    /// Replacements go back through `visit` before they are kept: a winning
    /// variant may itself be a container, and only a kept node is guaranteed
    /// container-free.
    fn resolve_slots(&self, node: &mut CompositionNode) {
        for children in node.slots.values_mut() {
            let incoming = std::mem::take(children);
            let mut pending: VecDeque<CompositionNode> = incoming.into();
            let mut resolved = Vec::with_capacity(pending.len());

            while let Some(mut child) = pending.pop_front() {
                match self.visit(&mut child) {
                    NodeEdit::Keep => {
                        self.resolve_slots(&mut child);
                        resolved.push(child);
                    }
                    NodeEdit::ReplaceWith(replacements) => {
                        // Requeue at the front, order intact, so each
                        // replacement is re-visited in turn.
                        for replacement in replacements.into_iter().rev() {
                            pending.push_front(replacement);
                        }
                    }
                    NodeEdit::Remove => {}
                }
            }

            *children = resolved;
        }
    }

    fn visit(&self, node: &mut CompositionNode) -> NodeEdit {
        match node.node_type.as_str() {
            PERSONALIZE_TYPE => self.resolve_personalization(node),
            TEST_TYPE => self.resolve_test(node),
            _ => NodeEdit::Keep,
        }
    }

    /// Resolve a personalization container against the decision context.
    fn resolve_personalization(&self, node: &mut CompositionNode) -> NodeEdit {
        let variations = node.take_slot(PERSONALIZE_SLOT);
        if variations.is_empty() {
            // zero candidates: no decision to make
            return NodeEdit::Remove;
        }

        let take = parse_take(
            node.parameters.get("count"),
            self.options.missing_count,
            variations.len(),
        );
        let name = node
            .parameter_str("trackingEventName")
            .unwrap_or(DEFAULT_PERSONALIZATION_NAME);
        let algorithm = node.parameter_str("algorithm");

        let outcome = self.context.personalize(name, variations, take, algorithm);
        if outcome.variations.is_empty() {
            return NodeEdit::Remove;
        }

        NodeEdit::ReplaceWith(
            outcome
                .variations
                .into_iter()
                .map(sanitize_personalized_variant)
                .collect(),
        )
    }

    /// Resolve a test container against the decision context.
    fn resolve_test(&self, node: &mut CompositionNode) -> NodeEdit {
        let variations = node.take_slot(TEST_SLOT);
        if variations.is_empty() {
            return NodeEdit::Remove;
        }

        let name = node.parameter_str("test").unwrap_or(DEFAULT_TEST_NAME);

        match self.context.test(name, variations) {
            Some(variant) => NodeEdit::ReplaceWith(vec![sanitize_test_variant(variant)]),
            None => NodeEdit::Remove,
        }
    }
}

/// Strip personalization bookkeeping from an emitted variant: the
/// `$pzCrit` parameter and any engine-attached top-level fields. Other
/// parameters are untouched. Idempotent.
pub fn sanitize_personalized_variant(mut node: CompositionNode) -> CompositionNode {
    node.parameters.remove(PZ_CRITERIA_PARAM);
    for field in VARIANT_BOOKKEEPING_FIELDS {
        node.extra.remove(field);
    }
    node
}

/// Strip the `$tstVrnt` parameter from an emitted test variant. No other
/// reserved fields apply to test variants. Idempotent.
pub fn sanitize_test_variant(mut node: CompositionNode) -> CompositionNode {
    node.parameters.remove(TEST_VARIANT_PARAM);
    node
}

/// Whether any container discriminant survives in the tree. The resolver
/// guarantees this is false for every tree it returns.
pub fn contains_container(node: &CompositionNode) -> bool {
    node.is_container()
        || node
            .slots
            .values()
            .flatten()
            .any(contains_container)
}
