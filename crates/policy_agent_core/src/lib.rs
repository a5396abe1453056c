//! Policy Agent Core Types
//!
//! Request and response contexts exchanged between the enforcement and
//! decision points, the decision lattice, policy records, and the contracts
//! every collaborator point implements. Also hosts the deadline wrapper used
//! for every collaborator call.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod deadline;
pub mod decision;
pub mod error;
pub mod id;
pub mod point;
pub mod policy;
pub mod subject;
pub mod telemetry;

// Re-exports
pub use config::{DecisionConfig, EnforcementConfig, StoreConfig};
pub use context::{Request, RequestContext, Resource, ResourceKind, Response, ResponseContext};
pub use deadline::{Deadline, bounded};
pub use decision::{Decision, Obligation};
pub use error::{AgentError, AgentResult};
pub use id::{ContextId, PointId, RequestId};
pub use point::{AdministrationPoint, DecisionPoint, InformationPoint};
pub use policy::{ActionRecord, ConflictStrategy, RuleKind, RuleQuery, RuleRecord};
pub use subject::{Entity, Slot, Subject, SubjectRef};
