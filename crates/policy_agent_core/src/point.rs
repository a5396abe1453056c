//! Contracts of the collaborating policy points.
//!
//! Implementations must tolerate concurrent calls on the same handle; the
//! decision pipeline shares one handle per point across every in-flight
//! enforcement call.

use crate::context::{RequestContext, ResponseContext};
use crate::error::AgentResult;
use crate::id::PointId;
use crate::policy::{ActionRecord, RuleQuery, RuleRecord};
use crate::subject::{Subject, SubjectRef};
use async_trait::async_trait;

/// Information point: resolves subject references
#[async_trait]
pub trait InformationPoint: Send + Sync {
    /// Point identity, stamped on every resource it resolves
    fn id(&self) -> PointId;

    /// Health probe
    async fn ping(&self) -> AgentResult<()> {
        Ok(())
    }

    /// Resolve references in one batch.
    ///
    /// The result has the same length and order as `references`; a reference
    /// that cannot be resolved is `None`, never an error.
    async fn retrieve_subjects(&self, references: &[SubjectRef]) -> AgentResult<Vec<Option<Subject>>>;
}

/// Administration point: authoritative policy and action graph
#[async_trait]
pub trait AdministrationPoint: Send + Sync {
    /// Point identity
    fn id(&self) -> PointId;

    /// Health probe
    async fn ping(&self) -> AgentResult<()> {
        Ok(())
    }

    /// The action plus every action reachable over `implies`/`includedIn`
    async fn action_closure(&self, action: &str) -> AgentResult<Vec<ActionRecord>>;

    /// Rules bound to the query's target, actions, and parties
    async fn match_rules(&self, query: &RuleQuery) -> AgentResult<Vec<RuleRecord>>;
}

/// Decision point: answers request contexts
#[async_trait]
pub trait DecisionPoint: Send + Sync {
    /// Point identity
    fn id(&self) -> PointId;

    /// Whether every collaborator the point needs is connected
    fn is_ready(&self) -> bool;

    /// Decide every request node of the context
    async fn request_decision(&self, context: &RequestContext) -> AgentResult<ResponseContext>;
}
