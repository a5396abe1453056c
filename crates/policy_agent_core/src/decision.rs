//! Authorization decisions and their combination order.

use serde::{Deserialize, Serialize};

/// Decision for one requested action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// The action is allowed
    Permit,
    /// The action is forbidden
    Deny,
    /// Conflicting rules voided the policy
    Indeterminate,
    /// No rule applies
    NotApplicable,
}

impl Decision {
    /// Rank in the combination order `Deny > Indeterminate > Permit > NotApplicable`
    #[must_use]
    pub const fn restrictiveness(&self) -> u8 {
        match self {
            Self::Deny => 3,
            Self::Indeterminate => 2,
            Self::Permit => 1,
            Self::NotApplicable => 0,
        }
    }

    /// Pick the more restrictive of two decisions
    #[must_use]
    pub fn most_restrictive(self, other: Decision) -> Decision {
        if other.restrictiveness() > self.restrictiveness() {
            other
        } else {
            self
        }
    }

    /// Combine any number of decisions; empty input is `NotApplicable`
    pub fn combine(decisions: impl IntoIterator<Item = Decision>) -> Decision {
        decisions
            .into_iter()
            .fold(Decision::NotApplicable, Decision::most_restrictive)
    }

    /// Whether the decision is conclusive (Permit or Deny)
    #[must_use]
    pub const fn is_conclusive(&self) -> bool {
        matches!(self, Self::Permit | Self::Deny)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Permit => write!(f, "Permit"),
            Self::Deny => write!(f, "Deny"),
            Self::Indeterminate => write!(f, "Indeterminate"),
            Self::NotApplicable => write!(f, "NotApplicable"),
        }
    }
}

/// Obligation rule attached to a conclusive decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Obligation {
    /// Owning policy uid
    pub policy: String,
    /// Obligation rule uid
    pub rule: String,
    /// Action the obligation was matched through
    pub action: String,
}
