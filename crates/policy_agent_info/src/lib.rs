//! Policy Agent Information Point
//!
//! Document-style subject store. Subjects live in collections named after
//! their type; references resolve only when they identify exactly one
//! stored subject.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

pub use store::{StoreError, SubjectStore};
