use thiserror::Error;

/// Top-level error type for the Railsafe system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for RailsafeError`
/// so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RailsafeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Voice recognition error: {0}")]
    Voice(String),

    #[error("Timer error: {0}")]
    Timer(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for RailsafeError {
    fn from(err: toml::de::Error) -> Self {
        RailsafeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RailsafeError {
    fn from(err: toml::ser::Error) -> Self {
        RailsafeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RailsafeError {
    fn from(err: serde_json::Error) -> Self {
        RailsafeError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Railsafe operations.
pub type Result<T> = std::result::Result<T, RailsafeError>;
