//! Deadline-bounded collaborator calls.
//!
//! [`bounded`] races a call against its deadline. On expiry the caller gets
//! [`AgentError::Timeout`] while the call itself keeps running as a detached
//! task: abandonment is best-effort, not cancellation, so a slow backend may
//! still complete (or mutate state) after the timeout was reported.

use crate::error::{AgentError, AgentResult};
use std::future::Future;
use std::time::Duration;

/// Deadline for one collaborator call; zero or unset waits indefinitely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Duration>);

impl Deadline {
    /// No deadline
    #[must_use]
    pub const fn unbounded() -> Self {
        Self(None)
    }

    /// Deadline after `ms` milliseconds, `0` disables it
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Self(None)
        } else {
            Self(Some(Duration::from_millis(ms)))
        }
    }

    /// Deadline after a duration, zero disables it
    #[must_use]
    pub fn after(limit: Duration) -> Self {
        if limit.is_zero() { Self(None) } else { Self(Some(limit)) }
    }

    /// Limit, if any
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        self.0
    }

    /// Whether the deadline is disabled
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.0.is_none()
    }

    /// Limit in milliseconds, `0` when disabled
    #[must_use]
    pub fn as_millis(&self) -> u64 {
        self.0.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Run `call` under `deadline`.
///
/// # Errors
///
/// Returns the call's own error, [`AgentError::Timeout`] when the deadline
/// elapses first, or [`AgentError::Internal`] when the call panicked.
pub async fn bounded<T, F>(operation: &str, deadline: Deadline, call: F) -> AgentResult<T>
where
    F: Future<Output = AgentResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(call);
    let joined = match deadline.duration() {
        Some(limit) => tokio::time::timeout(limit, handle).await,
        None => Ok(handle.await),
    };

    match joined {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(AgentError::Internal {
            message: format!("{} aborted: {}", operation, join_err),
        }),
        Err(_) => {
            // Dropping the handle detaches the task; it is not aborted.
            tracing::warn!(
                operation = %operation,
                after_ms = deadline.as_millis(),
                "deadline elapsed, abandoning call"
            );
            Err(AgentError::Timeout {
                operation: operation.to_string(),
                after_ms: deadline.as_millis(),
            })
        }
    }
}
