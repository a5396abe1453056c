//! Subject resolution.
//!
//! References are deduplicated across the whole request context before the
//! information point is asked, so a subject shared by several requests is
//! resolved once and produces one resource.

use indexmap::map::Entry;
use policy_agent_core::{
    AgentError, AgentResult, Deadline, InformationPoint, RequestContext, RequestId, Resource,
    ResourceKind, ResponseContext, Slot, SubjectRef, bounded,
};
use std::sync::Arc;

/// One distinct reference and every slot holding it
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// First occurrence of the reference
    pub reference: SubjectRef,
    /// `(request, slot)` pairs holding an equivalent reference
    pub slots: Vec<(RequestId, Slot)>,
}

/// Distinct references of a request context, in first-occurrence order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectIndex {
    entries: Vec<IndexEntry>,
}

impl SubjectIndex {
    /// Record a reference found in a slot
    pub fn record(&mut self, reference: &SubjectRef, request: &RequestId, slot: Slot) {
        let pair = (request.clone(), slot);
        match self.entries.iter_mut().find(|e| e.reference.is_equivalent(reference)) {
            Some(entry) => entry.slots.push(pair),
            None => self.entries.push(IndexEntry {
                reference: reference.clone(),
                slots: vec![pair],
            }),
        }
    }

    /// Entries in first-occurrence order
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// References to send to the information point
    #[must_use]
    pub fn references(&self) -> Vec<SubjectRef> {
        self.entries.iter().map(|e| e.reference.clone()).collect()
    }

    /// Number of distinct references
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan every request's slots, in request then slot order
#[must_use]
pub fn collect_subjects(context: &RequestContext) -> SubjectIndex {
    let mut index = SubjectIndex::default();
    for (id, request) in &context.requests {
        for slot in Slot::ALL {
            if let Some(reference) = request.slot(slot).filter(|r| r.is_typed()) {
                index.record(reference, id, slot);
            }
        }
    }
    index
}

/// Resolve the context's subjects into `response`.
///
/// Resolved subjects become resources stamped with the information point's
/// id, and their uid is written into every slot that referenced them.
/// Unresolved references leave their slots empty.
///
/// # Errors
///
/// Returns the information point's error, `Timeout` if it misses the
/// deadline, or `Backend` if its answer does not line up with the request
pub async fn resolve_subjects(
    pip: Arc<dyn InformationPoint>,
    context: &RequestContext,
    response: &mut ResponseContext,
    deadline: Deadline,
) -> AgentResult<()> {
    let index = collect_subjects(context);
    if index.is_empty() {
        return Ok(());
    }

    let source = pip.id();
    let references = index.references();
    let resolved = bounded("retrieveSubjects", deadline, async move {
        pip.retrieve_subjects(&references).await
    })
    .await?;

    if resolved.len() != index.len() {
        return Err(AgentError::backend(
            "retrieveSubjects",
            format!("expected {} subjects, got {}", index.len(), resolved.len()),
        ));
    }

    for (entry, subject) in index.entries().iter().zip(resolved) {
        let Some(subject) = subject.filter(|s| !s.uid.is_empty()) else {
            tracing::debug!(context = %context.id, slots = entry.slots.len(), "subject absent");
            continue;
        };
        let uid = subject.uid.clone();

        if let Entry::Vacant(vacant) = response.resources.entry(uid.clone()) {
            let kind = entry
                .slots
                .first()
                .map_or(ResourceKind::Asset, |(_, slot)| ResourceKind::from(*slot));
            vacant.insert(Resource {
                uid: uid.clone(),
                kind,
                subject,
                source,
            });
        }

        for (request, slot) in &entry.slots {
            if let Some(answer) = response.responses.get_mut(request) {
                answer.set_slot_uid(*slot, uid.clone());
            }
        }
    }

    tracing::debug!(
        context = %context.id,
        references = index.len(),
        resources = response.resources.len(),
        "subjects resolved"
    );
    Ok(())
}
