//! Policy and action graph.
//!
//! Nodes are keyed by id. Mutations validate every referenced node, so the
//! graph never holds a dangling edge. Cycles are possible through
//! [`PolicyGraph::add_implication`]; every traversal carries a visited set.

use indexmap::{IndexMap, IndexSet};
use policy_agent_core::{
    ActionRecord, AgentError, AgentResult, ConflictStrategy, RuleKind, RuleQuery, RuleRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Actions present in every graph
pub const BASE_ACTIONS: [&str; 2] = ["use", "transfer"];

/// Action node
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionNode {
    /// Parent action
    pub included_in: Option<String>,
    /// Implied actions
    pub implies: Vec<String>,
    /// Action this one refines
    pub value: Option<String>,
}

/// Kind of a subject node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Single asset
    Asset,
    /// Group of assets
    AssetCollection,
    /// Single party
    Party,
    /// Group of parties
    PartyCollection,
}

impl NodeKind {
    /// Asset or asset collection
    #[must_use]
    pub const fn is_asset(&self) -> bool {
        matches!(self, Self::Asset | Self::AssetCollection)
    }

    /// Party or party collection
    #[must_use]
    pub const fn is_party(&self) -> bool {
        matches!(self, Self::Party | Self::PartyCollection)
    }

    /// Whether members can be attached
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::AssetCollection | Self::PartyCollection)
    }
}

/// Asset or party node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectNode {
    /// Node kind
    pub kind: NodeKind,
    /// Collections this node is a direct member of
    pub part_of: Vec<String>,
}

/// Rule node with its edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleNode {
    /// Owning policy
    pub policy: String,
    /// Edge type from the policy
    pub kind: RuleKind,
    /// Target asset or asset collection
    pub target: String,
    /// Bound action
    pub action: String,
    /// Assignee party or party collection
    pub assignee: Option<String>,
    /// Assigner party or party collection
    pub assigner: Option<String>,
}

impl RuleNode {
    /// Create a rule of `kind` in `policy`
    #[must_use]
    pub fn new(
        policy: impl Into<String>,
        kind: RuleKind,
        target: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            policy: policy.into(),
            kind,
            target: target.into(),
            action: action.into(),
            assignee: None,
            assigner: None,
        }
    }

    /// Bind an assignee
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Bind an assigner
    #[must_use]
    pub fn with_assigner(mut self, assigner: impl Into<String>) -> Self {
        self.assigner = Some(assigner.into());
        self
    }
}

/// In-memory policy graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGraph {
    actions: IndexMap<String, ActionNode>,
    subjects: IndexMap<String, SubjectNode>,
    policies: IndexMap<String, ConflictStrategy>,
    rules: IndexMap<String, RuleNode>,
}

impl PolicyGraph {
    /// Create a graph holding only the base actions
    #[must_use]
    pub fn new() -> Self {
        let actions = BASE_ACTIONS
            .iter()
            .map(|name| ((*name).to_string(), ActionNode::default()))
            .collect();
        Self {
            actions,
            subjects: IndexMap::new(),
            policies: IndexMap::new(),
            rules: IndexMap::new(),
        }
    }

    /// Define an action below `included_in`
    ///
    /// # Errors
    ///
    /// Returns a validation error if the id is empty or taken, or the parent
    /// is unknown
    pub fn define_action(&mut self, id: &str, included_in: Option<&str>) -> AgentResult<()> {
        if id.is_empty() {
            return Err(AgentError::validation("action", "empty id"));
        }
        if self.actions.contains_key(id) {
            return Err(AgentError::validation("action", format!("'{}' already defined", id)));
        }
        if let Some(parent) = included_in {
            self.require_action(parent)?;
        }

        self.actions.insert(
            id.to_string(),
            ActionNode {
                included_in: included_in.map(str::to_string),
                ..ActionNode::default()
            },
        );
        Ok(())
    }

    /// Add an `implies` edge
    ///
    /// # Errors
    ///
    /// Returns a validation error if either action is unknown
    pub fn add_implication(&mut self, action: &str, implied: &str) -> AgentResult<()> {
        self.require_action(implied)?;
        let node = self.action_mut(action)?;
        if !node.implies.iter().any(|a| a == implied) {
            node.implies.push(implied.to_string());
        }
        Ok(())
    }

    /// Mark `action` as a refinement of `value`
    ///
    /// # Errors
    ///
    /// Returns a validation error if either action is unknown
    pub fn add_refinement(&mut self, action: &str, value: &str) -> AgentResult<()> {
        self.require_action(value)?;
        self.action_mut(action)?.value = Some(value.to_string());
        Ok(())
    }

    /// Add an asset, party, or collection
    ///
    /// # Errors
    ///
    /// Returns a validation error if the uid is empty or taken
    pub fn add_subject(&mut self, uid: &str, kind: NodeKind) -> AgentResult<()> {
        if uid.is_empty() {
            return Err(AgentError::validation("subject", "empty uid"));
        }
        if self.subjects.contains_key(uid) {
            return Err(AgentError::validation("subject", format!("'{}' already defined", uid)));
        }
        self.subjects.insert(
            uid.to_string(),
            SubjectNode {
                kind,
                part_of: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add a `partOf` edge from `member` to `collection`
    ///
    /// # Errors
    ///
    /// Returns a validation error if either node is unknown, or `collection`
    /// is not a collection of the member's side
    pub fn add_part_of(&mut self, member: &str, collection: &str) -> AgentResult<()> {
        let collection_kind = self.subject_kind(collection)?;
        let member_kind = self.subject_kind(member)?;

        let compatible = match collection_kind {
            NodeKind::AssetCollection => member_kind.is_asset(),
            NodeKind::PartyCollection => member_kind.is_party(),
            NodeKind::Asset | NodeKind::Party => false,
        };
        if !compatible {
            return Err(AgentError::validation(
                "partOf",
                format!("'{}' cannot be part of '{}'", member, collection),
            ));
        }

        if let Some(node) = self.subjects.get_mut(member) {
            if !node.part_of.iter().any(|c| c == collection) {
                node.part_of.push(collection.to_string());
            }
        }
        Ok(())
    }

    /// Add a policy
    ///
    /// # Errors
    ///
    /// Returns a validation error if the uid is empty or taken
    pub fn add_policy(&mut self, uid: &str, conflict: ConflictStrategy) -> AgentResult<()> {
        if uid.is_empty() {
            return Err(AgentError::validation("policy", "empty uid"));
        }
        if self.policies.contains_key(uid) {
            return Err(AgentError::validation("policy", format!("'{}' already defined", uid)));
        }
        self.policies.insert(uid.to_string(), conflict);
        Ok(())
    }

    /// Add a rule
    ///
    /// # Errors
    ///
    /// Returns a validation error if the uid is empty or taken, or any node
    /// the rule points to is unknown or of the wrong kind
    pub fn add_rule(&mut self, uid: &str, rule: RuleNode) -> AgentResult<()> {
        if uid.is_empty() {
            return Err(AgentError::validation("rule", "empty uid"));
        }
        if self.rules.contains_key(uid) {
            return Err(AgentError::validation("rule", format!("'{}' already defined", uid)));
        }
        if !self.policies.contains_key(&rule.policy) {
            return Err(AgentError::validation(
                "rule",
                format!("unknown policy '{}'", rule.policy),
            ));
        }
        self.require_action(&rule.action)?;
        if !self.subject_kind(&rule.target)?.is_asset() {
            return Err(AgentError::validation(
                "rule",
                format!("target '{}' is not an asset", rule.target),
            ));
        }
        for party in [&rule.assignee, &rule.assigner].into_iter().flatten() {
            if !self.subject_kind(party)?.is_party() {
                return Err(AgentError::validation(
                    "rule",
                    format!("'{}' is not a party", party),
                ));
            }
        }

        self.rules.insert(uid.to_string(), rule);
        Ok(())
    }

    /// Whether the action is known
    #[must_use]
    pub fn has_action(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Number of rules
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The action and everything reachable over `includedIn` and `implies`,
    /// breadth first. Unknown actions have an empty closure.
    #[must_use]
    pub fn action_closure(&self, action: &str) -> Vec<ActionRecord> {
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::new();
        if self.actions.contains_key(action) {
            queue.push_back(action.to_string());
        }

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = self.actions.get(&id) else {
                continue;
            };
            for next in node.included_in.iter().chain(&node.implies) {
                if !visited.contains(next) {
                    queue.push_back(next.clone());
                }
            }
        }

        visited
            .into_iter()
            .filter_map(|id| {
                let node = self.actions.get(&id)?;
                Some(ActionRecord {
                    included_in: node.included_in.clone(),
                    implies: node.implies.clone(),
                    id,
                })
            })
            .collect()
    }

    /// Rules bound to the query, one record per matching closure action
    #[must_use]
    pub fn match_rules(&self, query: &RuleQuery) -> Vec<RuleRecord> {
        if !self.is_kind(&query.target, NodeKind::is_asset) {
            return Vec::new();
        }
        for party in [&query.assignee, &query.assigner].into_iter().flatten() {
            if !self.is_kind(party, NodeKind::is_party) {
                return Vec::new();
            }
        }

        let target_scope = self.membership(&query.target);
        let assignee_scope = query.assignee.as_deref().map(|p| self.membership(p));
        let assigner_scope = query.assigner.as_deref().map(|p| self.membership(p));

        let mut records = Vec::new();
        for action in &query.actions {
            if !self.actions.contains_key(action) {
                continue;
            }
            for (uid, rule) in &self.rules {
                let matched = target_scope.contains(&rule.target)
                    && self.binds_action(rule, action)
                    && party_matches(rule.assignee.as_ref(), assignee_scope.as_ref())
                    && party_matches(rule.assigner.as_ref(), assigner_scope.as_ref());
                if !matched {
                    continue;
                }
                let Some(conflict) = self.policies.get(&rule.policy) else {
                    continue;
                };
                records.push(RuleRecord {
                    action: action.clone(),
                    policy: rule.policy.clone(),
                    rule: uid.clone(),
                    kind: rule.kind,
                    conflict: *conflict,
                });
            }
        }
        records
    }

    /// The node itself plus every collection it is transitively part of
    fn membership(&self, uid: &str) -> IndexSet<String> {
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::from([uid.to_string()]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            if let Some(node) = self.subjects.get(&id) {
                queue.extend(node.part_of.iter().filter(|c| !visited.contains(*c)).cloned());
            }
        }
        visited
    }

    fn binds_action(&self, rule: &RuleNode, action: &str) -> bool {
        rule.action == action
            || self
                .actions
                .get(&rule.action)
                .and_then(|node| node.value.as_deref())
                == Some(action)
    }

    fn is_kind(&self, uid: &str, check: impl Fn(&NodeKind) -> bool) -> bool {
        self.subjects.get(uid).is_some_and(|node| check(&node.kind))
    }

    fn subject_kind(&self, uid: &str) -> AgentResult<NodeKind> {
        self.subjects
            .get(uid)
            .map(|node| node.kind)
            .ok_or_else(|| AgentError::validation("subject", format!("unknown subject '{}'", uid)))
    }

    fn require_action(&self, id: &str) -> AgentResult<()> {
        if self.actions.contains_key(id) {
            Ok(())
        } else {
            Err(AgentError::validation("action", format!("unknown action '{}'", id)))
        }
    }

    fn action_mut(&mut self, id: &str) -> AgentResult<&mut ActionNode> {
        self.actions
            .get_mut(id)
            .ok_or_else(|| AgentError::validation("action", format!("unknown action '{}'", id)))
    }
}

impl Default for PolicyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Unbound rule parties match only when no party was given; a bound one
/// must be the party or one of its collections
fn party_matches(bound: Option<&String>, scope: Option<&IndexSet<String>>) -> bool {
    match (bound, scope) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(party), Some(scope)) => scope.contains(party),
    }
}
