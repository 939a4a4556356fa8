//! Error types for voice keyword detection.

use railsafe_core::error::RailsafeError;

/// Errors from the speech recognition capability.
///
/// Neither variant is fatal: the listener logs it, reports it through
/// `ListenerStatus`, and stays stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoiceError {
    #[error("Speech recognition is not available on this platform")]
    RecognitionUnavailable,
    #[error("Recognition stream failed: {0}")]
    RecognitionStreamError(String),
}

impl From<VoiceError> for RailsafeError {
    fn from(err: VoiceError) -> Self {
        RailsafeError::Voice(err.to_string())
    }
}
