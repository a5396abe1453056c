//! Policy matching against the administration point.

use policy_agent_core::{
    AdministrationPoint, AgentResult, Deadline, Response, RuleQuery, RuleRecord, bounded,
};
use std::sync::Arc;

/// Candidate rules for one answered request.
///
/// Expands the requested action's closure, then matches rules against the
/// resolved target and parties. A request without a resolved target has no
/// candidates and the administration point is not asked.
///
/// # Errors
///
/// Returns the administration point's error, or `Timeout` if either query
/// misses the deadline
pub async fn match_policies(
    pap: &Arc<dyn AdministrationPoint>,
    response: &Response,
    deadline: Deadline,
) -> AgentResult<Vec<RuleRecord>> {
    let Some(target) = response.target.clone() else {
        return Ok(Vec::new());
    };

    let closure = {
        let pap = Arc::clone(pap);
        let action = response.action.clone();
        bounded("actionClosure", deadline, async move { pap.action_closure(&action).await }).await?
    };
    if closure.is_empty() {
        return Ok(Vec::new());
    }

    let query = RuleQuery::new(closure.into_iter().map(|a| a.id).collect(), target)
        .with_assignee(response.assignee.clone())
        .with_assigner(response.assigner.clone());

    let pap = Arc::clone(pap);
    let records = bounded("matchRules", deadline, async move { pap.match_rules(&query).await }).await?;

    tracing::debug!(request = %response.id, action = %response.action, records = records.len(), "rules matched");
    Ok(records)
}
