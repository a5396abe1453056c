//! Request and response contexts.
//!
//! A [`RequestContext`] is built once by the enforcement point and handed
//! read-only to every decision point. Each decision point answers with a
//! [`ResponseContext`] keyed by the same request ids.

use crate::decision::{Decision, Obligation};
use crate::id::{ContextId, PointId, RequestId};
use crate::subject::{Slot, Subject, SubjectRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One requested action with its slot references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request id
    pub id: RequestId,
    /// Action name
    pub action: String,
    /// Target reference
    pub target: Option<SubjectRef>,
    /// Assigner reference
    pub assigner: Option<SubjectRef>,
    /// Assignee reference
    pub assignee: Option<SubjectRef>,
}

impl Request {
    /// Create a request with empty slots
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        let action = action.into();
        Self {
            id: RequestId::for_action(&action),
            action,
            target: None,
            assigner: None,
            assignee: None,
        }
    }

    /// Reference in a slot
    #[must_use]
    pub fn slot(&self, slot: Slot) -> Option<&SubjectRef> {
        match slot {
            Slot::Target => self.target.as_ref(),
            Slot::Assigner => self.assigner.as_ref(),
            Slot::Assignee => self.assignee.as_ref(),
        }
    }

    /// Fill a slot
    pub fn set_slot(&mut self, slot: Slot, subject: Option<SubjectRef>) {
        match slot {
            Slot::Target => self.target = subject,
            Slot::Assigner => self.assigner = subject,
            Slot::Assignee => self.assignee = subject,
        }
    }
}

/// Request graph for one enforcement call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Context id
    pub id: ContextId,
    /// Session the call was made for
    pub session: Option<String>,
    /// Originally requested action
    pub action: String,
    /// Top-level target
    pub target: SubjectRef,
    /// Top-level assigner
    pub assigner: Option<SubjectRef>,
    /// Top-level assignee
    pub assignee: Option<SubjectRef>,
    /// Request nodes in emission order
    pub requests: IndexMap<RequestId, Request>,
}

impl RequestContext {
    /// Create an empty context
    #[must_use]
    pub fn new(action: impl Into<String>, target: SubjectRef) -> Self {
        Self {
            id: ContextId::new(),
            session: None,
            action: action.into(),
            target,
            assigner: None,
            assignee: None,
            requests: IndexMap::new(),
        }
    }

    /// Set the session id
    #[must_use]
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Set the top-level assigner
    #[must_use]
    pub fn with_assigner(mut self, assigner: Option<SubjectRef>) -> Self {
        self.assigner = assigner;
        self
    }

    /// Set the top-level assignee
    #[must_use]
    pub fn with_assignee(mut self, assignee: Option<SubjectRef>) -> Self {
        self.assignee = assignee;
        self
    }

    /// Top-level reference for a slot
    #[must_use]
    pub fn subject(&self, slot: Slot) -> Option<&SubjectRef> {
        match slot {
            Slot::Target => Some(&self.target),
            Slot::Assigner => self.assigner.as_ref(),
            Slot::Assignee => self.assignee.as_ref(),
        }
    }

    /// Append a request node
    pub fn push(&mut self, request: Request) {
        self.requests.insert(request.id.clone(), request);
    }

    /// Node of the originally requested action
    #[must_use]
    pub fn root(&self) -> Option<&Request> {
        self.requests.values().next()
    }

    /// Whether a node exists for the action
    #[must_use]
    pub fn contains_action(&self, action: &str) -> bool {
        self.requests.values().any(|r| r.action == action)
    }

    /// Number of request nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Answer for one request node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Mirrored request id
    pub id: RequestId,
    /// Action name
    pub action: String,
    /// Decision
    pub decision: Decision,
    /// Resolved target uid
    pub target: Option<String>,
    /// Resolved assigner uid
    pub assigner: Option<String>,
    /// Resolved assignee uid
    pub assignee: Option<String>,
    /// Obligations attached to a conclusive decision
    pub obligations: Vec<Obligation>,
}

impl Response {
    /// Unanswered response for a request
    #[must_use]
    pub fn pending(request: &Request) -> Self {
        Self {
            id: request.id.clone(),
            action: request.action.clone(),
            decision: Decision::NotApplicable,
            target: None,
            assigner: None,
            assignee: None,
            obligations: Vec::new(),
        }
    }

    /// Resolved uid in a slot
    #[must_use]
    pub fn slot_uid(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Target => self.target.as_deref(),
            Slot::Assigner => self.assigner.as_deref(),
            Slot::Assignee => self.assignee.as_deref(),
        }
    }

    /// Record a resolved uid
    pub fn set_slot_uid(&mut self, slot: Slot, uid: String) {
        match slot {
            Slot::Target => self.target = Some(uid),
            Slot::Assigner => self.assigner = Some(uid),
            Slot::Assignee => self.assignee = Some(uid),
        }
    }
}

/// Resource type by slot role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Resolved through a target slot
    Asset,
    /// Resolved through an assigner or assignee slot
    Party,
}

impl From<Slot> for ResourceKind {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Target => Self::Asset,
            Slot::Assigner | Slot::Assignee => Self::Party,
        }
    }
}

/// Resolved subject shared by every response referencing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Subject uid
    pub uid: String,
    /// Role-derived type
    pub kind: ResourceKind,
    /// Resolved subject
    pub subject: Subject,
    /// Information point that resolved it
    pub source: PointId,
}

/// Response graph of one decision point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseContext {
    /// Mirrored context id
    pub context: ContextId,
    /// Decision point that answered
    pub source: PointId,
    /// One response per request node
    pub responses: IndexMap<RequestId, Response>,
    /// Resolved subjects by uid
    pub resources: IndexMap<String, Resource>,
}

impl ResponseContext {
    /// Skeleton mirroring a request context, every decision `NotApplicable`
    #[must_use]
    pub fn for_request(request: &RequestContext, source: PointId) -> Self {
        Self {
            context: request.id,
            source,
            responses: request
                .requests
                .iter()
                .map(|(id, r)| (id.clone(), Response::pending(r)))
                .collect(),
            resources: IndexMap::new(),
        }
    }

    /// Decision for a request node
    #[must_use]
    pub fn decision(&self, id: &RequestId) -> Option<Decision> {
        self.responses.get(id).map(|r| r.decision)
    }

    /// Whether this response answers exactly the given request context
    #[must_use]
    pub fn mirrors(&self, request: &RequestContext) -> bool {
        self.context == request.id
            && self.responses.len() == request.requests.len()
            && request.requests.keys().all(|id| self.responses.contains_key(id))
    }
}
