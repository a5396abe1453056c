//! Records exchanged with the administration point.

use serde::{Deserialize, Serialize};

/// Rule type, named after the policy-to-rule edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Grants the action
    Permission,
    /// Side condition on a conclusive decision
    Obligation,
    /// Forbids the action
    Prohibition,
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permission => write!(f, "permission"),
            Self::Obligation => write!(f, "obligation"),
            Self::Prohibition => write!(f, "prohibition"),
        }
    }
}

/// Policy conflict strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Permissions override prohibitions
    Perm,
    /// Prohibitions override permissions
    Prohibit,
    /// Any conflict voids the policy
    #[default]
    Invalid,
}

impl std::str::FromStr for ConflictStrategy {
    type Err = crate::AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perm" => Ok(Self::Perm),
            "prohibit" => Ok(Self::Prohibit),
            "invalid" => Ok(Self::Invalid),
            other => Err(crate::AgentError::validation(
                "conflict",
                format!("unknown strategy '{}'", other),
            )),
        }
    }
}

/// One member of an action-implication closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Action id
    pub id: String,
    /// Parent action
    pub included_in: Option<String>,
    /// Implied actions
    pub implies: Vec<String>,
}

/// Rule-matching query for one requested action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleQuery {
    /// Closure actions
    pub actions: Vec<String>,
    /// Resolved target uid
    pub target: String,
    /// Resolved assignee uid
    pub assignee: Option<String>,
    /// Resolved assigner uid
    pub assigner: Option<String>,
}

impl RuleQuery {
    /// Create a query for a target
    #[must_use]
    pub fn new(actions: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            actions,
            target: target.into(),
            assignee: None,
            assigner: None,
        }
    }

    /// Constrain by assignee
    #[must_use]
    pub fn with_assignee(mut self, assignee: Option<String>) -> Self {
        self.assignee = assignee;
        self
    }

    /// Constrain by assigner
    #[must_use]
    pub fn with_assigner(mut self, assigner: Option<String>) -> Self {
        self.assigner = assigner;
        self
    }
}

/// Matched rule, flat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Closure action the rule matched through
    pub action: String,
    /// Owning policy uid
    pub policy: String,
    /// Rule uid
    pub rule: String,
    /// Rule type
    pub kind: RuleKind,
    /// Owning policy's conflict strategy
    pub conflict: ConflictStrategy,
}
