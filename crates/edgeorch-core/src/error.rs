//! Engine error taxonomy.
//!
//! Every failure an invoke can produce maps to exactly one variant with a
//! stable `kind()` string, so callers can tell "not allowed" from
//! "no capacity" from "transport down". All variants are terminal for
//! the request; the engine never retries.

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Boxed cause attached to dispatch failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("requester {requester} is not allowed to invoke {service}")]
    RequesterNotAllowed { service: String, requester: String },

    #[error("service not registered: {0}")]
    ServiceNotRegistered(String),

    #[error("executable is not allowed: {0}")]
    DisallowedExecutable(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("no eligible target for service: {0}")]
    NoEligibleTarget(String),

    #[error("dispatch to {target} failed: {source}")]
    DispatchFailed {
        target: String,
        #[source]
        source: BoxError,
    },
}

impl EngineError {
    /// Wrap a transport/executor failure for `target`.
    pub fn dispatch(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::DispatchFailed {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::RequesterNotAllowed { .. } => "requester_not_allowed",
            EngineError::ServiceNotRegistered(_) => "service_not_registered",
            EngineError::DisallowedExecutable(_) => "disallowed_executable",
            EngineError::InvalidCommand(_) => "invalid_command",
            EngineError::NoEligibleTarget(_) => "no_eligible_target",
            EngineError::DispatchFailed { .. } => "dispatch_failed",
        }
    }

    /// Whether the request was rejected before any placement work.
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            EngineError::RequesterNotAllowed { .. }
                | EngineError::ServiceNotRegistered(_)
                | EngineError::DisallowedExecutable(_)
                | EngineError::InvalidCommand(_)
        )
    }
}
