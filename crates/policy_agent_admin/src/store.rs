//! Administration point over a shared policy graph.

use crate::graph::PolicyGraph;
use async_trait::async_trait;
use policy_agent_core::{
    ActionRecord, AdministrationPoint, AgentResult, PointId, RuleQuery, RuleRecord, StoreConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Query statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyStats {
    /// Closure queries answered
    pub closure_queries: u64,
    /// Rule queries answered
    pub rule_queries: u64,
    /// Rule records returned
    pub records_returned: u64,
}

/// In-memory administration point
pub struct PolicyStore {
    /// Point identity
    id: PointId,
    /// Store configuration
    config: StoreConfig,
    /// Policy graph
    graph: RwLock<PolicyGraph>,
    /// Query statistics
    stats: RwLock<PolicyStats>,
}

impl PolicyStore {
    /// Create a store holding only the base actions
    #[must_use]
    pub fn new() -> Self {
        Self::from_graph(StoreConfig::named("administration-point"), PolicyGraph::new())
    }

    /// Create from a prepared graph
    #[must_use]
    pub fn from_graph(config: StoreConfig, graph: PolicyGraph) -> Self {
        Self {
            id: PointId::new(),
            config,
            graph: RwLock::new(graph),
            stats: RwLock::new(PolicyStats::default()),
        }
    }

    /// Store name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Apply a mutation to the graph.
    ///
    /// The edit runs under the write lock; a failed edit keeps whatever
    /// changes it made before failing.
    ///
    /// # Errors
    ///
    /// Returns the edit's error, or `Internal` if the lock is poisoned
    pub fn edit<R>(&self, edit: impl FnOnce(&mut PolicyGraph) -> AgentResult<R>) -> AgentResult<R> {
        let mut graph = self.graph.write()?;
        edit(&mut *graph)
    }

    /// Copy of the current graph
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned
    pub fn snapshot(&self) -> AgentResult<PolicyGraph> {
        Ok(self.graph.read()?.clone())
    }

    /// Get statistics
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned
    pub fn stats(&self) -> AgentResult<PolicyStats> {
        Ok(*self.stats.read()?)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdministrationPoint for PolicyStore {
    fn id(&self) -> PointId {
        self.id
    }

    async fn action_closure(&self, action: &str) -> AgentResult<Vec<ActionRecord>> {
        let closure = self.graph.read()?.action_closure(action);
        self.stats.write()?.closure_queries += 1;

        tracing::debug!(store = %self.config.name, action = %action, size = closure.len(), "action closure");
        Ok(closure)
    }

    async fn match_rules(&self, query: &RuleQuery) -> AgentResult<Vec<RuleRecord>> {
        let records = self.graph.read()?.match_rules(query);
        {
            let mut stats = self.stats.write()?;
            stats.rule_queries += 1;
            stats.records_returned += records.len() as u64;
        }

        tracing::debug!(
            store = %self.config.name,
            target = %query.target,
            actions = query.actions.len(),
            records = records.len(),
            "rules matched"
        );
        Ok(records)
    }
}
