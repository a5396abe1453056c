//! Point configuration.
//!
//! Every config has defaults, `with_*` builders, and can be loaded from JSON.
//! A timeout of `0` disables the corresponding deadline.

use crate::deadline::Deadline;
use crate::error::AgentResult;
use serde::{Deserialize, Serialize};

/// Default collaborator deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Decision point configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Point name, used for logging and the point id
    pub name: String,
    /// Deadline for information/administration point queries
    pub query_timeout_ms: u64,
}

impl DecisionConfig {
    /// Set point name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set query timeout
    #[must_use]
    pub fn with_query_timeout(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = timeout_ms;
        self
    }

    /// Deadline for collaborator queries
    #[must_use]
    pub const fn query_deadline(&self) -> Deadline {
        Deadline::from_millis(self.query_timeout_ms)
    }

    /// Load from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is malformed
    pub fn from_json(json: &str) -> AgentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            name: "decision-point".to_string(),
            query_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Enforcement point configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Point name
    pub name: String,
    /// Deadline for each decision point dispatch
    pub decision_timeout_ms: u64,
}

impl EnforcementConfig {
    /// Set point name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set decision timeout
    #[must_use]
    pub fn with_decision_timeout(mut self, timeout_ms: u64) -> Self {
        self.decision_timeout_ms = timeout_ms;
        self
    }

    /// Deadline for decision point dispatch
    #[must_use]
    pub const fn decision_deadline(&self) -> Deadline {
        Deadline::from_millis(self.decision_timeout_ms)
    }

    /// Load from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is malformed
    pub fn from_json(json: &str) -> AgentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            name: "enforcement-point".to_string(),
            decision_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Reference store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name, used for logging and the point id
    pub name: String,
}

impl StoreConfig {
    /// Create with a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Load from JSON
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is malformed
    pub fn from_json(json: &str) -> AgentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::named("store")
    }
}
