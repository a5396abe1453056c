//! Caller sessions.

use indexmap::IndexMap;
use policy_agent_core::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session an enforcement call is made for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SessionRecord")]
pub struct Session {
    id: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    attributes: IndexMap<String, Value>,
}

/// Unchecked wire form of a session
#[derive(Deserialize)]
struct SessionRecord {
    id: String,
    #[serde(default)]
    attributes: IndexMap<String, Value>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = AgentError;

    fn try_from(record: SessionRecord) -> AgentResult<Self> {
        let mut session = Self::new(record.id)?;
        session.attributes = record.attributes;
        Ok(session)
    }
}

impl Session {
    /// Create a session with a stable id
    ///
    /// # Errors
    ///
    /// Returns a validation error if the id is empty
    pub fn new(id: impl Into<String>) -> AgentResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AgentError::validation("session", "empty id"));
        }
        Ok(Self {
            id,
            attributes: IndexMap::new(),
        })
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attribute by key
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
