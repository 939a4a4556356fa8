//! Error types for the alert core.

use railsafe_core::error::RailsafeError;

/// Errors from the countdown timer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("Countdown timer is already running")]
    AlreadyRunning,
}

/// Errors from a single dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Responders unreachable: {0}")]
    Unreachable(String),
    #[error("Alert rejected: {0}")]
    Rejected(String),
}

impl DispatchError {
    /// Whether another attempt with the same record could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Unreachable(_))
    }
}

/// Errors crossing the orchestrator handle.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert orchestrator is not running")]
    OrchestratorStopped,
}

impl From<TimerError> for RailsafeError {
    fn from(err: TimerError) -> Self {
        RailsafeError::Timer(err.to_string())
    }
}

impl From<DispatchError> for RailsafeError {
    fn from(err: DispatchError) -> Self {
        RailsafeError::Dispatch(err.to_string())
    }
}

impl From<AlertError> for RailsafeError {
    fn from(err: AlertError) -> Self {
        match err {
            AlertError::OrchestratorStopped => RailsafeError::ShuttingDown,
        }
    }
}
