//! Error taxonomy for the decision pipeline.

/// Agent result type
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent error type
///
/// A rule-matching failure for one requested action is not an error: it
/// degrades that action to `NotApplicable` inside the decision point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// Malformed input
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Offending field or argument
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Action name not present in the registry
    #[error("Unknown action: {name}")]
    UnknownAction {
        /// Requested action name
        name: String,
    },

    /// A required collaborator is missing
    #[error("{point} not connected")]
    NotConnected {
        /// Which collaborator slot is empty
        point: String,
    },

    /// Collaborator slot already filled
    #[error("{point} already connected")]
    AlreadyConnected {
        /// Which collaborator slot is filled
        point: String,
    },

    /// Deadline elapsed on a collaborator call
    #[error("Timeout after {after_ms}ms: {operation}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline in milliseconds
        after_ms: u64,
    },

    /// No decision point produced a response
    #[error("Decision unavailable for context {context}")]
    DecisionUnavailable {
        /// Context identifier
        context: String,
    },

    /// Configuration could not be loaded
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Parser message
        reason: String,
    },

    /// Collaborator failure
    #[error("Backend error in {operation}: {message}")]
    Backend {
        /// Operation that failed
        operation: String,
        /// Error message
        message: String,
    },

    /// Internal error (for unexpected errors)
    #[error("Internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl AgentError {
    /// Shorthand for a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a backend error
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the error stems from malformed caller input
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::UnknownAction { .. })
    }

    /// Whether the error is a deadline expiry
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for AgentError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Internal {
            message: "lock poisoned".to_string(),
        }
    }
}
