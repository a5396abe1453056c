//! Decision engine.

use crate::conflict::{Evaluation, evaluate};
use crate::matching::match_policies;
use crate::resolve::resolve_subjects;
use async_trait::async_trait;
use policy_agent_core::{
    AdministrationPoint, AgentError, AgentResult, DecisionConfig, DecisionPoint, InformationPoint,
    PointId, RequestContext, ResponseContext,
};
use std::sync::Arc;

/// Decision point backed by one information point and one administration
/// point.
///
/// Collaborators are connected while the engine is still exclusively owned;
/// once shared behind an `Arc` its connections are fixed.
pub struct DecisionEngine {
    /// Point identity
    id: PointId,
    /// Engine configuration
    config: DecisionConfig,
    /// Subject resolution
    information: Option<Arc<dyn InformationPoint>>,
    /// Policy graph
    administration: Option<Arc<dyn AdministrationPoint>>,
}

impl DecisionEngine {
    /// Create an unconnected engine
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DecisionConfig::default())
    }

    /// Create with custom configuration
    #[must_use]
    pub fn with_config(config: DecisionConfig) -> Self {
        Self {
            id: PointId::new(),
            config,
            information: None,
            administration: None,
        }
    }

    /// Engine name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Connect the information point
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConnected` if one is already connected
    pub fn connect_pip(&mut self, pip: Arc<dyn InformationPoint>) -> AgentResult<()> {
        if self.information.is_some() {
            return Err(AgentError::AlreadyConnected {
                point: "information point".to_string(),
            });
        }
        tracing::info!(engine = %self.config.name, pip = %pip.id(), "information point connected");
        self.information = Some(pip);
        Ok(())
    }

    /// Connect the administration point
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConnected` if one is already connected
    pub fn connect_pap(&mut self, pap: Arc<dyn AdministrationPoint>) -> AgentResult<()> {
        if self.administration.is_some() {
            return Err(AgentError::AlreadyConnected {
                point: "administration point".to_string(),
            });
        }
        tracing::info!(engine = %self.config.name, pap = %pap.id(), "administration point connected");
        self.administration = Some(pap);
        Ok(())
    }

    fn collaborators(&self) -> AgentResult<(Arc<dyn InformationPoint>, Arc<dyn AdministrationPoint>)> {
        let information = self.information.clone().ok_or_else(|| AgentError::NotConnected {
            point: "information point".to_string(),
        })?;
        let administration = self.administration.clone().ok_or_else(|| AgentError::NotConnected {
            point: "administration point".to_string(),
        })?;
        Ok((information, administration))
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionPoint for DecisionEngine {
    fn id(&self) -> PointId {
        self.id
    }

    fn is_ready(&self) -> bool {
        self.information.is_some() && self.administration.is_some()
    }

    async fn request_decision(&self, context: &RequestContext) -> AgentResult<ResponseContext> {
        let (information, administration) = self.collaborators()?;
        let deadline = self.config.query_deadline();

        let mut response = ResponseContext::for_request(context, self.id);
        resolve_subjects(information, context, &mut response, deadline).await?;

        for answer in response.responses.values_mut() {
            let evaluation = match match_policies(&administration, answer, deadline).await {
                Ok(records) => evaluate(&records),
                Err(err) => {
                    tracing::warn!(
                        engine = %self.config.name,
                        request = %answer.id,
                        error = %err,
                        "rule matching failed, request not applicable"
                    );
                    Evaluation::not_applicable()
                }
            };
            answer.decision = evaluation.decision;
            answer.obligations = evaluation.obligations;
        }

        tracing::debug!(
            engine = %self.config.name,
            context = %context.id,
            requests = response.responses.len(),
            "decision complete"
        );
        Ok(response)
    }
}
