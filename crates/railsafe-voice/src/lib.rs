//! Railsafe Voice crate - distress keyword detection over a speech-to-text stream.
//!
//! Provides transcript normalization and phrase matching, the
//! `SpeechRecognizer` capability trait that platform integrations implement,
//! and the `KeywordListener` variants (platform-backed and no-op) that turn a
//! transcript stream into `KeywordDetected` callbacks.

pub mod error;
pub mod listener;
pub mod matcher;
pub mod recognizer;
pub mod supervisor;

pub use error::VoiceError;
pub use listener::{
    keyword_listener_for, KeywordCallback, KeywordDetection, KeywordListener, ListenerStatus,
    NoopKeywordListener, PlatformKeywordListener,
};
pub use matcher::{normalize_transcript, KeywordMatcher};
pub use recognizer::{ChannelRecognizer, SpeechRecognizer, TranscriptEvent, TranscriptFeed};
pub use supervisor::spawn_listener_supervisor;
