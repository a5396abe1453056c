//! In-memory subject store.

use async_trait::async_trait;
use indexmap::IndexMap;
use policy_agent_core::{
    AgentError, AgentResult, Entity, InformationPoint, PointId, StoreConfig, Subject, SubjectRef,
};
use std::sync::RwLock;

/// Store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Subject without uid
    #[error("Subject of type {kind} has no uid")]
    MissingUid {
        /// Subject type
        kind: String,
    },
    /// Subject without type
    #[error("Subject {uid} has no type")]
    MissingType {
        /// Subject uid
        uid: String,
    },
    /// Uid already stored in the collection
    #[error("Subject {uid} already stored in {kind}")]
    DuplicateUid {
        /// Collection
        kind: String,
        /// Subject uid
        uid: String,
    },
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        AgentError::Validation {
            field: "subject".to_string(),
            reason: err.to_string(),
        }
    }
}

/// In-memory information point
pub struct SubjectStore {
    /// Point identity
    id: PointId,
    /// Store configuration
    config: StoreConfig,
    /// Collections by type, subjects by uid
    collections: RwLock<IndexMap<String, IndexMap<String, Subject>>>,
}

impl SubjectStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::named("information-point"))
    }

    /// Create with custom configuration
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            id: PointId::new(),
            config,
            collections: RwLock::new(IndexMap::new()),
        }
    }

    /// Store name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Store a subject
    ///
    /// # Errors
    ///
    /// Returns a validation error if the subject has no uid or type, or its
    /// uid is already taken in its collection
    pub fn submit(&self, subject: Subject) -> AgentResult<()> {
        if subject.uid.is_empty() {
            return Err(StoreError::MissingUid { kind: subject.kind }.into());
        }
        if subject.kind.trim().is_empty() {
            return Err(StoreError::MissingType { uid: subject.uid }.into());
        }

        let mut collections = self.collections.write()?;
        let collection = collections.entry(subject.kind.clone()).or_default();
        if collection.contains_key(&subject.uid) {
            return Err(StoreError::DuplicateUid {
                kind: subject.kind,
                uid: subject.uid,
            }
            .into());
        }

        tracing::debug!(store = %self.config.name, kind = %subject.kind, uid = %subject.uid, "subject stored");
        collection.insert(subject.uid.clone(), subject);
        Ok(())
    }

    /// Store every subject of a JSON array
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is malformed, or the first
    /// submission error; subjects before the failing one stay stored
    pub fn submit_json(&self, json: &str) -> AgentResult<usize> {
        let subjects: Vec<Subject> = serde_json::from_str(json)?;
        let count = subjects.len();
        for subject in subjects {
            self.submit(subject)?;
        }
        Ok(count)
    }

    /// Remove a subject
    ///
    /// # Errors
    ///
    /// Returns error if the store lock is poisoned
    pub fn remove(&self, kind: &str, uid: &str) -> AgentResult<bool> {
        let mut collections = self.collections.write()?;
        Ok(collections
            .get_mut(kind)
            .is_some_and(|c| c.shift_remove(uid).is_some()))
    }

    /// Number of stored subjects
    ///
    /// # Errors
    ///
    /// Returns error if the store lock is poisoned
    pub fn len(&self) -> AgentResult<usize> {
        let collections = self.collections.read()?;
        Ok(collections.values().map(IndexMap::len).sum())
    }

    /// Check if empty
    ///
    /// # Errors
    ///
    /// Returns error if the store lock is poisoned
    pub fn is_empty(&self) -> AgentResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Resolve one reference; zero or several matches resolve to `None`
    ///
    /// # Errors
    ///
    /// Returns error if the store lock is poisoned
    pub fn resolve(&self, reference: &SubjectRef) -> AgentResult<Option<Subject>> {
        let collections = self.collections.read()?;

        let resolved = match reference {
            SubjectRef::Inline(entity) => {
                let Some(collection) = collections.get(&entity.kind) else {
                    return Ok(None);
                };
                let mut found = collection.values().filter(|s| entity_matches(entity, s));
                match (found.next(), found.next()) {
                    (Some(subject), None) => Some(subject.clone()),
                    _ => None,
                }
            }
            SubjectRef::Id(uid) => {
                let mut found = collections.values().filter_map(|c| c.get(uid));
                match (found.next(), found.next()) {
                    (Some(subject), None) => Some(subject.clone()),
                    _ => None,
                }
            }
        };

        Ok(resolved)
    }
}

impl Default for SubjectStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Every attribute of the reference is present and equal on the subject
fn entity_matches(entity: &Entity, subject: &Subject) -> bool {
    entity.uid.as_ref().is_none_or(|uid| *uid == subject.uid)
        && entity
            .attributes
            .iter()
            .all(|(key, value)| subject.attributes.get(key) == Some(value))
}

#[async_trait]
impl InformationPoint for SubjectStore {
    fn id(&self) -> PointId {
        self.id
    }

    async fn retrieve_subjects(&self, references: &[SubjectRef]) -> AgentResult<Vec<Option<Subject>>> {
        let resolved = references
            .iter()
            .map(|reference| {
                if !reference.is_typed() {
                    return Ok(None);
                }
                self.resolve(reference)
            })
            .collect::<AgentResult<Vec<_>>>()?;

        tracing::debug!(
            store = %self.config.name,
            requested = references.len(),
            resolved = resolved.iter().filter(|s| s.is_some()).count(),
            "subjects retrieved"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> SubjectStore {
        let store = SubjectStore::new();
        store
            .submit(Subject::new("Asset", "A1").with_attr("title", "report").with_attr("owner", "P1"))
            .unwrap();
        store
            .submit(Subject::new("Asset", "A2").with_attr("title", "slides").with_attr("owner", "P1"))
            .unwrap();
        store
            .submit(Subject::new("Party", "P1").with_attr("name", "alice"))
            .unwrap();
        store
    }

    #[test]
    fn test_submit_and_len() {
        let store = make_store();
        assert_eq!(store.len().unwrap(), 3);
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn test_submit_rejects_missing_uid() {
        let store = SubjectStore::new();
        let err = store.submit(Subject::new("Asset", "")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_submit_rejects_duplicate() {
        let store = make_store();
        let err = store.submit(Subject::new("Asset", "A1")).unwrap_err();
        assert!(err.to_string().contains("already stored"));

        // Same uid in another collection is fine
        assert!(store.submit(Subject::new("Party", "A1")).is_ok());
    }

    #[test]
    fn test_resolve_by_attributes() {
        let store = make_store();
        let reference = SubjectRef::inline(Entity::new("Asset").with_attr("title", "report"));
        let subject = store.resolve(&reference).unwrap().unwrap();
        assert_eq!(subject.uid, "A1");
    }

    #[test]
    fn test_resolve_ambiguous_is_absent() {
        let store = make_store();
        let reference = SubjectRef::inline(Entity::new("Asset").with_attr("owner", "P1"));
        assert!(store.resolve(&reference).unwrap().is_none());
    }

    #[test]
    fn test_resolve_by_id() {
        let store = make_store();
        let subject = store.resolve(&SubjectRef::id("P1")).unwrap().unwrap();
        assert_eq!(subject.kind, "Party");
        assert!(store.resolve(&SubjectRef::id("missing")).unwrap().is_none());
    }

    #[test]
    fn test_resolve_shared_id_is_absent() {
        let store = make_store();
        store.submit(Subject::new("Party", "A1")).unwrap();
        assert!(store.resolve(&SubjectRef::id("A1")).unwrap().is_none());
        assert!(store.resolve(&SubjectRef::id("A2")).unwrap().is_some());
    }

    #[test]
    fn test_submit_json() {
        let store = SubjectStore::new();
        let count = store
            .submit_json(r#"[{"@type": "Asset", "uid": "A9", "title": "draft"}, {"@type": "Party", "uid": "P9"}]"#)
            .unwrap();
        assert_eq!(count, 2);

        let reference = SubjectRef::inline(Entity::new("Asset").with_attr("title", "draft"));
        assert_eq!(store.resolve(&reference).unwrap().map(|s| s.uid), Some("A9".to_string()));
        assert!(store.submit_json("[{").is_err());
    }

    #[test]
    fn test_remove() {
        let store = make_store();
        assert!(store.remove("Asset", "A2").unwrap());
        assert!(!store.remove("Asset", "A2").unwrap());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_preserves_order_and_length() {
        let store = make_store();
        let references = vec![
            SubjectRef::id("P1"),
            SubjectRef::inline(Entity::new("Asset").with_uid("nope")),
            SubjectRef::inline(Entity::new("")),
            SubjectRef::inline(Entity::new("Asset").with_uid("A2")),
        ];

        let resolved = store.retrieve_subjects(&references).await.unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[0].as_ref().map(|s| s.uid.as_str()), Some("P1"));
        assert!(resolved[1].is_none());
        assert!(resolved[2].is_none());
        assert_eq!(resolved[3].as_ref().map(|s| s.uid.as_str()), Some("A2"));
    }

    #[tokio::test]
    async fn test_ping() {
        let store = SubjectStore::new();
        assert!(store.ping().await.is_ok());
    }
}
