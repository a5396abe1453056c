//! Tracing subscriber setup for hosts embedding the agent.

use crate::error::{AgentError, AgentResult};
use tracing_subscriber::EnvFilter;

/// Default filter directive
pub const DEFAULT_FILTER: &str = "policy_agent=info";

/// Install a global fmt subscriber filtered by `filter`.
///
/// Installing twice is harmless: the first subscriber stays in place.
///
/// # Errors
///
/// Returns `InvalidConfig` if the filter directive does not parse
pub fn init_tracing(filter: &str) -> AgentResult<()> {
    let filter = EnvFilter::try_new(filter).map_err(|err| AgentError::InvalidConfig {
        reason: err.to_string(),
    })?;

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
