//! Policy Agent Decision Point
//!
//! Answers a request context in three steps:
//!
//! 1. Resolve every distinct subject reference through the information point
//!    in one batched call.
//! 2. For each requested action with a resolved target, expand the action
//!    closure and match candidate rules through the administration point.
//! 3. Evaluate the matched rules per policy and combine the policies, most
//!    restrictive first.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod engine;
pub mod matching;
pub mod resolve;

pub use conflict::{Evaluation, evaluate};
pub use engine::DecisionEngine;
pub use matching::match_policies;
pub use resolve::{IndexEntry, SubjectIndex, collect_subjects, resolve_subjects};
