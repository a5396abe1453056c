//! Policy Agent Enforcement Point
//!
//! Turns one requested action into a request context covering every
//! included and implied action, asks every connected decision point
//! concurrently, and merges their answers into a single [`Outcome`].
//! Decision points that fail or miss their deadline are left out of the
//! merge; only when none answers does the call fail.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
pub mod aggregate;
pub mod point;
pub mod request;
pub mod session;

pub use action::{ActionCallback, ActionDefinition, ActionRegistry, ActionSpec, SlotBindings};
pub use aggregate::{Outcome, Verdict, dispatch, merge};
pub use point::EnforcementPoint;
pub use request::{RequestParams, build_request_context};
pub use session::Session;
