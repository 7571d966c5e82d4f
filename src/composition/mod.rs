//! Composition data model and the tree resolution engine.

pub mod criteria;
pub mod node;
pub mod resolver;

pub use node::{CompositionNode, CompositionRoute};
pub use resolver::{ResolverOptions, TreeResolver};
