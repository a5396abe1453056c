//! Enforcement point.

use crate::action::{ActionRegistry, ActionSpec};
use crate::aggregate::{Outcome, Verdict, dispatch, merge};
use crate::request::{RequestParams, build_request_context};
use crate::session::Session;
use indexmap::IndexMap;
use policy_agent_core::{
    AgentError, AgentResult, DecisionPoint, EnforcementConfig, PointId, Slot,
};
use std::sync::{Arc, RwLock};

/// Policy enforcement point
pub struct EnforcementPoint {
    /// Point identity
    id: PointId,
    /// Point configuration
    config: EnforcementConfig,
    /// Registered actions
    actions: RwLock<ActionRegistry>,
    /// Connected decision points
    decision_points: Arc<tokio::sync::RwLock<IndexMap<PointId, Arc<dyn DecisionPoint>>>>,
}

impl EnforcementPoint {
    /// Create a point with the base actions and no decision points
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EnforcementConfig::default())
    }

    /// Create with custom configuration
    #[must_use]
    pub fn with_config(config: EnforcementConfig) -> Self {
        Self {
            id: PointId::new(),
            config,
            actions: RwLock::new(ActionRegistry::new()),
            decision_points: Arc::new(tokio::sync::RwLock::new(IndexMap::new())),
        }
    }

    /// Point identity
    #[must_use]
    pub fn id(&self) -> PointId {
        self.id
    }

    /// Point name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Register an action and its execution callback
    ///
    /// # Errors
    ///
    /// Returns a validation error if the declaration is rejected by the
    /// registry
    pub fn define_action(
        &self,
        spec: ActionSpec,
        callback: impl Fn(&Session, &Verdict) -> AgentResult<()> + Send + Sync + 'static,
    ) -> AgentResult<()> {
        self.actions.write()?.define(spec, callback)
    }

    /// Connect a decision point
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the decision point is missing a
    /// collaborator, or `AlreadyConnected` if it is already connected
    pub async fn connect_pdp(&self, pdp: Arc<dyn DecisionPoint>) -> AgentResult<()> {
        let id = pdp.id();
        if !pdp.is_ready() {
            return Err(AgentError::NotConnected {
                point: format!("collaborator of {}", id),
            });
        }

        let mut points = self.decision_points.write().await;
        if points.contains_key(&id) {
            return Err(AgentError::AlreadyConnected {
                point: id.to_string(),
            });
        }
        points.insert(id, pdp);

        tracing::info!(pep = %self.config.name, pdp = %id, "decision point connected");
        Ok(())
    }

    /// Disconnect a decision point
    pub async fn disconnect_pdp(&self, id: PointId) -> bool {
        self.decision_points.write().await.shift_remove(&id).is_some()
    }

    /// Number of connected decision points
    pub async fn decision_point_count(&self) -> usize {
        self.decision_points.read().await.len()
    }

    /// Decide `action` for a session.
    ///
    /// `params` supplies the top-level `target`, `assigner`, and `assignee`
    /// plus any keys the involved actions bind their slots to.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or untyped target,
    /// `UnknownAction` for an unregistered action, or `DecisionUnavailable`
    /// if no decision point answered
    pub async fn enforcement_request(
        &self,
        session: &Session,
        action: &str,
        params: &RequestParams,
    ) -> AgentResult<Outcome> {
        let target = params
            .subject(Slot::Target)
            .ok_or_else(|| AgentError::validation("target", "missing"))?;

        let context = {
            let registry = self.actions.read()?;
            build_request_context(
                &registry,
                target,
                params.subject(Slot::Assigner),
                params.subject(Slot::Assignee),
                action,
                params,
            )?
        }
        .with_session(session.id());
        let context = Arc::new(context);

        let points: Vec<_> = self.decision_points.read().await.values().cloned().collect();
        let responses = dispatch(points, Arc::clone(&context), self.config.decision_deadline()).await;
        if responses.is_empty() {
            tracing::warn!(pep = %self.config.name, context = %context.id, "no decision point answered");
            return Err(AgentError::DecisionUnavailable {
                context: context.id.to_string(),
            });
        }

        let outcome = merge(&context, &responses);
        tracing::debug!(
            pep = %self.config.name,
            context = %context.id,
            session = %session.id(),
            action = %action,
            decision = %outcome.decision(),
            responders = responses.len(),
            "enforcement request decided"
        );
        Ok(outcome)
    }

    /// Run the callback of the outcome's requested action.
    ///
    /// Only a conclusive decision (`Permit` or `Deny`) runs the callback;
    /// returns whether it ran.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the outcome belongs to another session,
    /// `UnknownAction` if the action is no longer registered, or the
    /// callback's own error
    pub fn execute(&self, session: &Session, outcome: &Outcome) -> AgentResult<bool> {
        if outcome.session.as_deref().is_some_and(|id| id != session.id()) {
            return Err(AgentError::validation("session", "outcome belongs to another session"));
        }
        let Some(verdict) = outcome.root() else {
            return Ok(false);
        };
        if !verdict.decision.is_conclusive() {
            return Ok(false);
        }

        let callback = self.actions.read()?.callback(&verdict.action)?;
        callback(session, verdict)?;

        tracing::debug!(pep = %self.config.name, action = %verdict.action, decision = %verdict.decision, "action executed");
        Ok(true)
    }
}

impl Default for EnforcementPoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use policy_agent_admin::{NodeKind, PolicyStore, RuleNode};
    use policy_agent_core::{
        ConflictStrategy, Decision, DecisionConfig, Entity, RequestContext, ResponseContext,
        RuleKind, Subject, telemetry,
    };
    use policy_agent_decide::DecisionEngine;
    use policy_agent_info::SubjectStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn make_engine(rules: &[(&str, RuleKind)]) -> DecisionEngine {
        let info = SubjectStore::new();
        info.submit(Subject::new("Asset", "A1").with_attr("title", "report"))
            .unwrap();
        info.submit(Subject::new("Party", "P1")).unwrap();

        let admin = PolicyStore::new();
        admin
            .edit(|graph| {
                graph.define_action("print", Some("use"))?;
                graph.add_subject("A1", NodeKind::Asset)?;
                graph.add_subject("P1", NodeKind::Party)?;
                graph.add_policy("policy-1", ConflictStrategy::default())?;
                for (i, (action, kind)) in rules.iter().enumerate() {
                    graph.add_rule(&format!("r{}", i), RuleNode::new("policy-1", *kind, "A1", *action))?;
                }
                Ok(())
            })
            .unwrap();

        let mut engine = DecisionEngine::with_config(DecisionConfig::default().with_query_timeout(1000));
        engine.connect_pip(Arc::new(info)).unwrap();
        engine.connect_pap(Arc::new(admin)).unwrap();
        engine
    }

    fn make_params(uid: &str) -> RequestParams {
        RequestParams::new().with("target", Entity::new("Asset").with_uid(uid))
    }

    fn make_session() -> Session {
        Session::new("session-1").unwrap()
    }

    /// Answers after a delay, permitting every request
    struct SlowPoint {
        id: PointId,
        delay: Duration,
    }

    #[async_trait]
    impl DecisionPoint for SlowPoint {
        fn id(&self) -> PointId {
            self.id
        }

        fn is_ready(&self) -> bool {
            true
        }

        async fn request_decision(&self, context: &RequestContext) -> AgentResult<ResponseContext> {
            tokio::time::sleep(self.delay).await;
            let mut response = ResponseContext::for_request(context, self.id);
            for answer in response.responses.values_mut() {
                answer.decision = Decision::Permit;
            }
            Ok(response)
        }
    }

    fn slow(delay_ms: u64) -> Arc<SlowPoint> {
        Arc::new(SlowPoint {
            id: PointId::new(),
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn test_permission_permits() {
        telemetry::init_tracing("policy_agent=debug").unwrap();
        let pep = EnforcementPoint::new();
        pep.connect_pdp(Arc::new(make_engine(&[("use", RuleKind::Permission)])))
            .await
            .unwrap();

        let outcome = pep
            .enforcement_request(&make_session(), "use", &make_params("A1"))
            .await
            .unwrap();
        assert_eq!(outcome.decision(), Decision::Permit);
        assert_eq!(outcome.session.as_deref(), Some("session-1"));
        assert_eq!(outcome.root().unwrap().target.as_deref(), Some("A1"));
        assert_eq!(outcome.resources["A1"].subject.attributes["title"], "report");
    }

    #[tokio::test]
    async fn test_inline_attributes_resolve_target() {
        let pep = EnforcementPoint::new();
        pep.connect_pdp(Arc::new(make_engine(&[("use", RuleKind::Prohibition)])))
            .await
            .unwrap();

        let params = RequestParams::new().with("target", Entity::new("Asset").with_attr("title", "report"));
        let outcome = pep.enforcement_request(&make_session(), "use", &params).await.unwrap();
        assert_eq!(outcome.decision(), Decision::Deny);
    }

    #[tokio::test]
    async fn test_absent_target_not_applicable() {
        let pep = EnforcementPoint::new();
        pep.connect_pdp(Arc::new(make_engine(&[("use", RuleKind::Permission)])))
            .await
            .unwrap();

        let outcome = pep
            .enforcement_request(&make_session(), "use", &make_params("A404"))
            .await
            .unwrap();
        assert_eq!(outcome.decision(), Decision::NotApplicable);
        assert!(outcome.resources.is_empty());
    }

    #[tokio::test]
    async fn test_defined_action_inherits_parent_rules() {
        let pep = EnforcementPoint::new();
        pep.define_action(ActionSpec::new("print").included_in("use"), |_, _| Ok(()))
            .unwrap();
        pep.connect_pdp(Arc::new(make_engine(&[("use", RuleKind::Permission)])))
            .await
            .unwrap();

        let outcome = pep
            .enforcement_request(&make_session(), "print", &make_params("A1"))
            .await
            .unwrap();
        assert_eq!(outcome.verdicts.len(), 2);
        assert_eq!(outcome.decision(), Decision::Permit);
        assert_eq!(outcome.verdict("use").unwrap().decision, Decision::Permit);
    }

    #[tokio::test]
    async fn test_timed_out_point_is_ignored() {
        let pep = EnforcementPoint::with_config(EnforcementConfig::default().with_decision_timeout(50));
        pep.connect_pdp(slow(5_000)).await.unwrap();
        pep.connect_pdp(slow(0)).await.unwrap();

        let outcome = pep
            .enforcement_request(&make_session(), "use", &make_params("A1"))
            .await
            .unwrap();
        assert_eq!(outcome.decision(), Decision::Permit);
        assert_eq!(outcome.responders.len(), 1);
    }

    /// Crashes on every request
    struct CrashingPoint {
        id: PointId,
    }

    #[async_trait]
    impl DecisionPoint for CrashingPoint {
        fn id(&self) -> PointId {
            self.id
        }

        fn is_ready(&self) -> bool {
            true
        }

        async fn request_decision(&self, _context: &RequestContext) -> AgentResult<ResponseContext> {
            panic!("decision backend crashed");
        }
    }

    #[tokio::test]
    async fn test_crashed_point_is_ignored() {
        for timeout_ms in [0, 1000] {
            let pep = EnforcementPoint::with_config(
                EnforcementConfig::default().with_decision_timeout(timeout_ms),
            );
            pep.connect_pdp(Arc::new(CrashingPoint { id: PointId::new() }))
                .await
                .unwrap();
            pep.connect_pdp(slow(0)).await.unwrap();

            let outcome = pep
                .enforcement_request(&make_session(), "use", &make_params("A1"))
                .await
                .unwrap();
            assert_eq!(outcome.decision(), Decision::Permit);
            assert_eq!(outcome.responders.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_no_answer_is_unavailable() {
        let pep = EnforcementPoint::with_config(EnforcementConfig::default().with_decision_timeout(20));
        let err = pep
            .enforcement_request(&make_session(), "use", &make_params("A1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DecisionUnavailable { .. }));

        pep.connect_pdp(slow(5_000)).await.unwrap();
        let err = pep
            .enforcement_request(&make_session(), "use", &make_params("A1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::DecisionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let pep = EnforcementPoint::new();
        let session = make_session();

        let err = pep
            .enforcement_request(&session, "use", &RequestParams::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = pep
            .enforcement_request(&session, "fly", &make_params("A1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownAction { .. }));
    }

    #[tokio::test]
    async fn test_connect_pdp_checks() {
        let pep = EnforcementPoint::new();
        assert!(matches!(
            pep.connect_pdp(Arc::new(DecisionEngine::new())).await,
            Err(AgentError::NotConnected { .. })
        ));

        let point = slow(0);
        pep.connect_pdp(point.clone()).await.unwrap();
        assert!(matches!(
            pep.connect_pdp(point.clone()).await,
            Err(AgentError::AlreadyConnected { .. })
        ));
        assert_eq!(pep.decision_point_count().await, 1);
        assert!(pep.disconnect_pdp(point.id).await);
        assert_eq!(pep.decision_point_count().await, 0);
    }

    #[tokio::test]
    async fn test_execute_runs_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let pep = EnforcementPoint::new();
        pep.define_action(ActionSpec::new("print").included_in("use"), move |session, verdict| {
            assert_eq!(session.id(), "session-1");
            assert_eq!(verdict.action, "print");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        pep.connect_pdp(Arc::new(make_engine(&[("use", RuleKind::Permission)])))
            .await
            .unwrap();

        let session = make_session();
        let outcome = pep
            .enforcement_request(&session, "print", &make_params("A1"))
            .await
            .unwrap();
        assert!(pep.execute(&session, &outcome).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other = Session::new("session-2").unwrap();
        assert!(pep.execute(&other, &outcome).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_skips_inconclusive() {
        let pep = EnforcementPoint::new();
        pep.connect_pdp(Arc::new(make_engine(&[]))).await.unwrap();

        let session = make_session();
        let outcome = pep
            .enforcement_request(&session, "use", &make_params("A1"))
            .await
            .unwrap();
        assert_eq!(outcome.decision(), Decision::NotApplicable);
        assert!(!pep.execute(&session, &outcome).unwrap());
    }

    #[test]
    fn test_define_action_errors() {
        let pep = EnforcementPoint::new();
        pep.define_action(ActionSpec::new("x").included_in("use"), |_, _| Ok(()))
            .unwrap();
        assert!(pep
            .define_action(ActionSpec::new("x").included_in("use"), |_, _| Ok(()))
            .unwrap_err()
            .is_validation());
        assert!(pep
            .define_action(ActionSpec::new("y").included_in("nonexistent"), |_, _| Ok(()))
            .is_err());
    }
}
