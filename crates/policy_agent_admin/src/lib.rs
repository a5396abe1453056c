//! Policy Agent Administration Point
//!
//! In-memory policy graph: actions with their implication and refinement
//! edges, assets and parties grouped into collections, and policies owning
//! permission, obligation, and prohibition rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod graph;
pub mod store;

pub use graph::{ActionNode, BASE_ACTIONS, NodeKind, PolicyGraph, RuleNode, SubjectNode};
pub use store::{PolicyStats, PolicyStore};
