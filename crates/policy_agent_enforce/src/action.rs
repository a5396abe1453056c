//! Action registry.
//!
//! Actions form a DAG rooted at `use` and `transfer`. Registration is
//! append-only and only refers backwards, so no cycle can be built.

use crate::aggregate::Verdict;
use crate::session::Session;
use indexmap::IndexMap;
use policy_agent_core::{AgentError, AgentResult, Slot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Built-in root actions
pub const BASE_ACTIONS: [&str; 2] = ["use", "transfer"];

/// Callback run after a conclusive decision on its action
pub type ActionCallback = Arc<dyn Fn(&Session, &Verdict) -> AgentResult<()> + Send + Sync>;

/// Request parameter keys supplying each slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBindings {
    /// Key for the target
    pub target: Option<String>,
    /// Key for the assigner
    pub assigner: Option<String>,
    /// Key for the assignee
    pub assignee: Option<String>,
}

impl SlotBindings {
    /// Parameter key bound to a slot
    #[must_use]
    pub fn key(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Target => self.target.as_deref(),
            Slot::Assigner => self.assigner.as_deref(),
            Slot::Assignee => self.assignee.as_deref(),
        }
    }

    fn set(&mut self, slot: Slot, key: String) {
        match slot {
            Slot::Target => self.target = Some(key),
            Slot::Assigner => self.assigner = Some(key),
            Slot::Assignee => self.assignee = Some(key),
        }
    }
}

/// Declaration of a new action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    name: String,
    included_in: Option<String>,
    implies: Vec<String>,
    bindings: SlotBindings,
}

impl ActionSpec {
    /// Start a declaration
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included_in: None,
            implies: Vec::new(),
            bindings: SlotBindings::default(),
        }
    }

    /// Set the parent action
    #[must_use]
    pub fn included_in(mut self, parent: impl Into<String>) -> Self {
        self.included_in = Some(parent.into());
        self
    }

    /// Add an implied action
    #[must_use]
    pub fn implies(mut self, action: impl Into<String>) -> Self {
        self.implies.push(action.into());
        self
    }

    /// Bind a slot to a request parameter key
    #[must_use]
    pub fn bind(mut self, slot: Slot, key: impl Into<String>) -> Self {
        self.bindings.set(slot, key.into());
        self
    }
}

/// Registered action
#[derive(Clone)]
pub struct ActionDefinition {
    /// Action name
    pub name: String,
    /// Parent action
    pub included_in: Option<String>,
    /// Implied actions
    pub implies: Vec<String>,
    /// Slot bindings
    pub bindings: SlotBindings,
    /// Execution callback
    pub callback: ActionCallback,
}

impl std::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("included_in", &self.included_in)
            .field("implies", &self.implies)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// Action registry
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: IndexMap<String, ActionDefinition>,
}

impl ActionRegistry {
    /// Create a registry holding the base actions
    #[must_use]
    pub fn new() -> Self {
        let noop: ActionCallback = Arc::new(|_: &Session, _: &Verdict| -> AgentResult<()> { Ok(()) });
        let actions = BASE_ACTIONS
            .iter()
            .map(|name| {
                let definition = ActionDefinition {
                    name: (*name).to_string(),
                    included_in: None,
                    implies: Vec::new(),
                    bindings: SlotBindings::default(),
                    callback: Arc::clone(&noop),
                };
                ((*name).to_string(), definition)
            })
            .collect();
        Self { actions }
    }

    /// Register an action
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is empty or taken, the parent
    /// is missing or unknown, an implied action is unknown, or a binding key
    /// is not a valid parameter name
    pub fn define(
        &mut self,
        spec: ActionSpec,
        callback: impl Fn(&Session, &Verdict) -> AgentResult<()> + Send + Sync + 'static,
    ) -> AgentResult<()> {
        let ActionSpec {
            name,
            included_in,
            implies,
            bindings,
        } = spec;

        if name.trim().is_empty() {
            return Err(AgentError::validation("action", "empty name"));
        }
        if self.actions.contains_key(&name) {
            return Err(AgentError::validation("action", format!("'{}' already defined", name)));
        }
        let Some(parent) = included_in else {
            return Err(AgentError::validation(
                "includedIn",
                format!("'{}' needs a parent action", name),
            ));
        };
        if !self.actions.contains_key(&parent) {
            return Err(AgentError::validation("includedIn", format!("'{}' unknown", parent)));
        }
        if let Some(unknown) = implies.iter().find(|a| !self.actions.contains_key(*a)) {
            return Err(AgentError::validation("implies", format!("'{}' unknown", unknown)));
        }
        for slot in Slot::ALL {
            if let Some(key) = bindings.key(slot) {
                if !is_param_name(key) {
                    return Err(AgentError::validation(
                        slot.as_str(),
                        format!("'{}' is not a parameter name", key),
                    ));
                }
            }
        }

        tracing::debug!(action = %name, parent = %parent, implies = ?implies, "action defined");
        self.actions.insert(
            name.clone(),
            ActionDefinition {
                name,
                included_in: Some(parent),
                implies,
                bindings,
                callback: Arc::new(callback),
            },
        );
        Ok(())
    }

    /// Look up an action
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` if the action is not registered
    pub fn get(&self, name: &str) -> AgentResult<&ActionDefinition> {
        self.actions.get(name).ok_or_else(|| AgentError::UnknownAction {
            name: name.to_string(),
        })
    }

    /// Callback of an action
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` if the action is not registered
    pub fn callback(&self, name: &str) -> AgentResult<ActionCallback> {
        Ok(Arc::clone(&self.get(name)?.callback))
    }

    /// Whether the action is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Number of actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// ASCII letters, digits, `_` and `-`, not starting with a digit
fn is_param_name(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
