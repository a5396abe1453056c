//! Request context construction.

use crate::action::ActionRegistry;
use indexmap::{IndexMap, IndexSet};
use policy_agent_core::{AgentError, AgentResult, Request, RequestContext, Slot, SubjectRef};
use serde::{Deserialize, Serialize};

/// Named subject references supplied with an enforcement call.
///
/// The keys `target`, `assigner`, and `assignee` hold the top-level subjects;
/// actions may bind their slots to any other key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(IndexMap<String, SubjectRef>);

impl RequestParams {
    /// Create empty parameters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, subject: impl Into<SubjectRef>) -> Self {
        self.0.insert(key.into(), subject.into());
        self
    }

    /// Parameter by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SubjectRef> {
        self.0.get(key)
    }

    /// Top-level subject for a slot
    #[must_use]
    pub fn subject(&self, slot: Slot) -> Option<&SubjectRef> {
        self.get(slot.as_str())
    }

    /// Load from a JSON object
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the JSON is not an object of subject
    /// references
    pub fn from_json(json: &str) -> AgentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Build the request context for `action`.
///
/// The requested action comes first, followed depth-first by its parent
/// chain and then its implied actions; each action appears once. Every slot
/// takes the parameter its action binds it to, falling back to the
/// top-level subject. Untyped references are dropped.
///
/// # Errors
///
/// Returns a validation error if the target is untyped, or `UnknownAction`
/// if the action is not registered
pub fn build_request_context(
    registry: &ActionRegistry,
    target: &SubjectRef,
    assigner: Option<&SubjectRef>,
    assignee: Option<&SubjectRef>,
    action: &str,
    params: &RequestParams,
) -> AgentResult<RequestContext> {
    if !target.is_typed() {
        return Err(AgentError::validation("target", "missing type"));
    }
    registry.get(action)?;

    let mut context = RequestContext::new(action, target.clone())
        .with_assigner(typed(Slot::Assigner, assigner))
        .with_assignee(typed(Slot::Assignee, assignee));

    let mut visited: IndexSet<&str> = IndexSet::new();
    let mut pending = vec![action];
    while let Some(name) = pending.pop() {
        if !visited.insert(name) {
            continue;
        }
        let definition = registry.get(name)?;

        let mut request = Request::new(name);
        for slot in Slot::ALL {
            let bound = definition
                .bindings
                .key(slot)
                .and_then(|key| params.get(key))
                .filter(|subject| subject.is_typed());
            request.set_slot(slot, bound.or_else(|| context.subject(slot)).cloned());
        }
        context.push(request);

        pending.extend(definition.implies.iter().rev().map(String::as_str));
        if let Some(parent) = definition.included_in.as_deref() {
            pending.push(parent);
        }
    }

    tracing::debug!(context = %context.id, action = %action, requests = context.len(), "request context built");
    Ok(context)
}

fn typed(slot: Slot, subject: Option<&SubjectRef>) -> Option<SubjectRef> {
    match subject {
        Some(subject) if subject.is_typed() => Some(subject.clone()),
        Some(_) => {
            tracing::debug!(slot = %slot, "untyped subject dropped");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;
    use crate::aggregate::Verdict;
    use crate::session::Session;
    use policy_agent_core::Entity;
    use proptest::prelude::*;
    use proptest::sample::Index;
    use std::collections::BTreeSet;

    fn noop(_: &Session, _: &Verdict) -> AgentResult<()> {
        Ok(())
    }

    fn asset(uid: &str) -> SubjectRef {
        SubjectRef::inline(Entity::new("Asset").with_uid(uid))
    }

    fn make_registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.define(ActionSpec::new("read").included_in("use"), noop).unwrap();
        registry
            .define(
                ActionSpec::new("print")
                    .included_in("use")
                    .implies("read")
                    .bind(Slot::Target, "document")
                    .bind(Slot::Assignee, "printer"),
                noop,
            )
            .unwrap();
        registry
    }

    fn actions(context: &RequestContext) -> Vec<&str> {
        context.requests.values().map(|r| r.action.as_str()).collect()
    }

    #[test]
    fn test_parent_then_implied_order() {
        let registry = make_registry();
        let context =
            build_request_context(&registry, &asset("A1"), None, None, "print", &RequestParams::new())
                .unwrap();

        // "use" is reached through print and again through read
        assert_eq!(actions(&context), vec!["print", "use", "read"]);
        assert_eq!(context.root().map(|r| r.action.as_str()), Some("print"));
        assert!(context.requests.keys().all(|id| {
            let action = &context.requests[id].action;
            id.as_str().starts_with(&format!("{}-", action))
        }));
    }

    #[test]
    fn test_bound_params_override_top_level() {
        let registry = make_registry();
        let params = RequestParams::new()
            .with("document", asset("A2"))
            .with("printer", SubjectRef::id("P2"));
        let assignee = SubjectRef::id("P1");
        let context =
            build_request_context(&registry, &asset("A1"), None, Some(&assignee), "print", &params)
                .unwrap();

        let print = context.root().unwrap();
        assert_eq!(print.slot(Slot::Target).and_then(SubjectRef::uid), Some("A2"));
        assert_eq!(print.slot(Slot::Assignee).and_then(SubjectRef::uid), Some("P2"));

        let read = context.requests.values().find(|r| r.action == "read").unwrap();
        assert_eq!(read.slot(Slot::Target).and_then(SubjectRef::uid), Some("A1"));
        assert_eq!(read.slot(Slot::Assignee).and_then(SubjectRef::uid), Some("P1"));
        assert!(read.slot(Slot::Assigner).is_none());
    }

    #[test]
    fn test_untyped_params_fall_back() {
        let registry = make_registry();
        let params = RequestParams::new().with("document", SubjectRef::inline(Entity::new("")));
        let assigner = SubjectRef::inline(Entity::new(" "));
        let context =
            build_request_context(&registry, &asset("A1"), Some(&assigner), None, "print", &params)
                .unwrap();

        assert!(context.assigner.is_none());
        let print = context.root().unwrap();
        assert_eq!(print.slot(Slot::Target).and_then(SubjectRef::uid), Some("A1"));
        assert!(print.slot(Slot::Assigner).is_none());
    }

    #[test]
    fn test_untyped_target_rejected() {
        let registry = make_registry();
        let target = SubjectRef::inline(Entity::new(""));
        let err = build_request_context(&registry, &target, None, None, "use", &RequestParams::new())
            .unwrap_err();
        assert!(matches!(err, AgentError::Validation { .. }));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let registry = make_registry();
        let err =
            build_request_context(&registry, &asset("A1"), None, None, "fly", &RequestParams::new())
                .unwrap_err();
        assert_eq!(err, AgentError::UnknownAction { name: "fly".to_string() });
    }

    #[test]
    fn test_params_from_json() {
        let params = RequestParams::from_json(
            r#"{"target": {"@type": "Asset", "uid": "A1"}, "assignee": "P1"}"#,
        )
        .unwrap();
        assert_eq!(params.subject(Slot::Target).and_then(SubjectRef::kind), Some("Asset"));
        assert_eq!(params.subject(Slot::Assignee), Some(&SubjectRef::id("P1")));
        assert!(RequestParams::from_json("[1, 2]").is_err());
    }

    /// Registers `a0..aN` below `use`, each with a parent and implications
    /// among earlier actions
    fn make_dag(shape: &[(Index, Vec<Index>)]) -> (ActionRegistry, Vec<String>) {
        let mut registry = ActionRegistry::new();
        let mut names = vec!["use".to_string()];
        for (i, (parent, implies)) in shape.iter().enumerate() {
            let name = format!("a{}", i);
            let mut spec = ActionSpec::new(name.clone()).included_in(parent.get(&names).clone());
            for implied in implies {
                spec = spec.implies(implied.get(&names).clone());
            }
            registry.define(spec, noop).unwrap();
            names.push(name);
        }
        (registry, names)
    }

    fn reachable(registry: &ActionRegistry, action: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![action.to_string()];
        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let definition = registry.get(&name).unwrap();
            stack.extend(definition.included_in.iter().cloned());
            stack.extend(definition.implies.iter().cloned());
        }
        seen
    }

    proptest::proptest! {
        #[test]
        fn prop_one_node_per_reachable_action(
            shape in proptest::collection::vec(
                (any::<Index>(), proptest::collection::vec(any::<Index>(), 0..3)),
                1..12,
            ),
            pick in any::<Index>(),
        ) {
            let (registry, names) = make_dag(&shape);
            let action = pick.get(&names);
            let context = build_request_context(
                &registry,
                &asset("A1"),
                None,
                None,
                action,
                &RequestParams::new(),
            )
            .unwrap();

            let emitted: Vec<String> = context.requests.values().map(|r| r.action.clone()).collect();
            let distinct: BTreeSet<String> = emitted.iter().cloned().collect();
            prop_assert_eq!(emitted.len(), distinct.len());
            prop_assert_eq!(distinct, reachable(&registry, action));
            prop_assert_eq!(emitted[0].as_str(), action.as_str());
        }
    }
}
