//! Subject references and resolved subjects.
//!
//! A reference is what the enforcement point knows about an entity when a
//! request arrives; a [`Subject`] is what an information point returns after
//! resolving it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Role a subject plays in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// The asset acted upon
    Target,
    /// The party granting the action
    Assigner,
    /// The party performing the action
    Assignee,
}

impl Slot {
    /// All slots in scan order
    pub const ALL: [Slot; 3] = [Slot::Target, Slot::Assigner, Slot::Assignee];

    /// Parameter name of the slot
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Assigner => "assigner",
            Self::Assignee => "assignee",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline entity description: a type plus attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type, also the collection it is looked up in
    #[serde(rename = "@type")]
    pub kind: String,
    /// Unique identifier, when the caller already knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Remaining attributes
    #[serde(flatten)]
    pub attributes: IndexMap<String, Value>,
}

impl Entity {
    /// Create an entity of the given type
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uid: None,
            attributes: IndexMap::new(),
        }
    }

    /// Set the uid
    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Reference to a subject inside a request
///
/// Cloning an inline reference shares the entity, so clones stay the
/// "same instance" for equivalence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectRef {
    /// Inline entity description
    Inline(Arc<Entity>),
    /// Opaque identifier
    Id(String),
}

impl SubjectRef {
    /// Wrap an inline entity
    #[must_use]
    pub fn inline(entity: Entity) -> Self {
        Self::Inline(Arc::new(entity))
    }

    /// Opaque identifier reference
    #[must_use]
    pub fn id(uid: impl Into<String>) -> Self {
        Self::Id(uid.into())
    }

    /// Resolved unique identifier, if the reference carries one
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Inline(entity) => entity.uid.as_deref(),
            Self::Id(uid) => Some(uid.as_str()),
        }
    }

    /// Declared type of an inline reference
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Inline(entity) => Some(entity.kind.as_str()),
            Self::Id(_) => None,
        }
    }

    /// Whether the reference is usable: an inline entity with a non-blank
    /// type, or a non-empty identifier
    #[must_use]
    pub fn is_typed(&self) -> bool {
        match self {
            Self::Inline(entity) => !entity.kind.trim().is_empty(),
            Self::Id(uid) => !uid.is_empty(),
        }
    }

    /// Same instance, or same uid
    #[must_use]
    pub fn is_equivalent(&self, other: &SubjectRef) -> bool {
        if let (Self::Inline(a), Self::Inline(b)) = (self, other) {
            if Arc::ptr_eq(a, b) {
                return true;
            }
        }
        matches!((self.uid(), other.uid()), (Some(a), Some(b)) if a == b)
    }
}

impl From<Entity> for SubjectRef {
    fn from(entity: Entity) -> Self {
        Self::inline(entity)
    }
}

/// Subject as resolved by an information point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Unique identifier
    pub uid: String,
    /// Entity type
    #[serde(rename = "@type")]
    pub kind: String,
    /// Stored attributes
    #[serde(flatten)]
    pub attributes: IndexMap<String, Value>,
}

impl Subject {
    /// Create a subject
    #[must_use]
    pub fn new(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: kind.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
