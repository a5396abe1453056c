//! Decision aggregation.
//!
//! Every decision point gets the same request context at the same time. The
//! answers that arrive in time and mirror the context are merged request by
//! request; the most restrictive decision wins.

use futures::future::join_all;
use indexmap::IndexMap;
use policy_agent_core::{
    ContextId, Deadline, Decision, DecisionPoint, Obligation, PointId, RequestContext, RequestId,
    Resource, ResponseContext, Slot, bounded,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Merged answer for one request node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Request id
    pub request: RequestId,
    /// Action name
    pub action: String,
    /// Merged decision
    pub decision: Decision,
    /// Resolved target uid
    pub target: Option<String>,
    /// Resolved assigner uid
    pub assigner: Option<String>,
    /// Resolved assignee uid
    pub assignee: Option<String>,
    /// Obligations from the decision points that reached `decision`
    pub obligations: Vec<Obligation>,
    /// Decision points that reached `decision`
    pub sources: Vec<PointId>,
}

impl Verdict {
    fn pending(request: RequestId, action: String) -> Self {
        Self {
            request,
            action,
            decision: Decision::NotApplicable,
            target: None,
            assigner: None,
            assignee: None,
            obligations: Vec::new(),
            sources: Vec::new(),
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
}

/// Result of one enforcement call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Request context id
    pub context: ContextId,
    /// Session the call was made for
    pub session: Option<String>,
    /// Originally requested action
    pub action: String,
    /// One verdict per request node, in context order
    pub verdicts: IndexMap<RequestId, Verdict>,
    /// Resolved subjects by uid
    pub resources: IndexMap<String, Resource>,
    /// Decision points whose answers were merged
    pub responders: Vec<PointId>,
}

impl Outcome {
    /// Verdict of the originally requested action
    #[must_use]
    pub fn root(&self) -> Option<&Verdict> {
        self.verdicts.values().next()
    }

    /// Decision on the originally requested action
    #[must_use]
    pub fn decision(&self) -> Decision {
        self.root().map_or(Decision::NotApplicable, |v| v.decision)
    }

    /// Verdict for an action name
    #[must_use]
    pub fn verdict(&self, action: &str) -> Option<&Verdict> {
        self.verdicts.values().find(|v| v.action == action)
    }
}

/// Ask every decision point concurrently.
///
/// Failures, timeouts, and answers that do not mirror the context are
/// logged and left out.
pub async fn dispatch(
    points: Vec<Arc<dyn DecisionPoint>>,
    context: Arc<RequestContext>,
    deadline: Deadline,
) -> Vec<ResponseContext> {
    let calls = points.into_iter().map(|point| {
        let context = Arc::clone(&context);
        let id = point.id();
        async move {
            let result = bounded("requestDecision", deadline, async move {
                point.request_decision(&context).await
            })
            .await;
            (id, result)
        }
    });

    join_all(calls)
        .await
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(response) if response.mirrors(&context) => Some(response),
            Ok(_) => {
                tracing::warn!(pdp = %id, context = %context.id, "response does not mirror request, discarded");
                None
            }
            Err(err) => {
                tracing::warn!(pdp = %id, context = %context.id, error = %err, "decision point failed");
                None
            }
        })
        .collect()
}

/// Merge answers node by node.
///
/// The merged decision is the most restrictive answer; a node no answer
/// covers stays `NotApplicable`. Slot uids take the first resolved value,
/// resources the first occurrence of each uid.
#[must_use]
pub fn merge(context: &RequestContext, responses: &[ResponseContext]) -> Outcome {
    let mut verdicts: IndexMap<RequestId, Verdict> = context
        .requests
        .iter()
        .map(|(id, request)| (id.clone(), Verdict::pending(id.clone(), request.action.clone())))
        .collect();

    for (id, verdict) in &mut verdicts {
        let answers: Vec<_> = responses
            .iter()
            .filter_map(|response| response.responses.get(id).map(|answer| (response.source, answer)))
            .collect();

        verdict.decision = Decision::combine(answers.iter().map(|(_, answer)| answer.decision));
        for (source, answer) in &answers {
            for slot in Slot::ALL {
                if verdict.slot_uid(slot).is_none() {
                    if let Some(uid) = answer.slot_uid(slot) {
                        set_slot_uid(verdict, slot, uid);
                    }
                }
            }
            if answer.decision != verdict.decision {
                continue;
            }
            verdict.sources.push(*source);
            for obligation in &answer.obligations {
                if !verdict.obligations.contains(obligation) {
                    verdict.obligations.push(obligation.clone());
                }
            }
        }
    }

    let mut resources = IndexMap::new();
    for response in responses {
        for (uid, resource) in &response.resources {
            resources.entry(uid.clone()).or_insert_with(|| resource.clone());
        }
    }

    Outcome {
        context: context.id,
        session: context.session.clone(),
        action: context.action.clone(),
        verdicts,
        resources,
        responders: responses.iter().map(|r| r.source).collect(),
    }
}

fn set_slot_uid(verdict: &mut Verdict, slot: Slot, uid: &str) {
    let uid = Some(uid.to_string());
    match slot {
        Slot::Target => verdict.target = uid,
        Slot::Assigner => verdict.assigner = uid,
        Slot::Assignee => verdict.assignee = uid,
    }
}
