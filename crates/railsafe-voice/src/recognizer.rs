//! Speech recognition capability.
//!
//! The platform recognizer is a continuous, interim-result stream. The
//! listener only ever sees the trait below; the host wires in whatever the
//! platform provides.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::error::VoiceError;

/// Buffered segments per open stream.
const STREAM_CAPACITY: usize = 64;

/// One item from a recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A final or interim transcript segment.
    Segment(String),
    /// The stream broke. No further segments follow.
    Error(String),
}

/// A continuous speech recognizer.
pub trait SpeechRecognizer: Send + Sync {
    /// Open a recognition stream for `locale`.
    ///
    /// The stream ends when the returned receiver yields `None`.
    fn open(&self, locale: &str) -> Result<mpsc::Receiver<TranscriptEvent>, VoiceError>;
}

/// Recognizer fed by hand: the console front end and tests push transcript
/// text through a [`TranscriptFeed`].
///
/// Each `open` replaces the previous stream, so a feed taken before a
/// restart stops delivering.
#[derive(Debug, Default)]
pub struct ChannelRecognizer {
    sender: Mutex<Option<mpsc::Sender<TranscriptEvent>>>,
}

impl ChannelRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the currently open stream, if one is open.
    pub fn feed(&self) -> Option<TranscriptFeed> {
        let guard = self.sender.lock().ok()?;
        guard.as_ref().map(|tx| TranscriptFeed { tx: tx.clone() })
    }

    /// Close the current stream, as if the platform ended it.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

impl SpeechRecognizer for ChannelRecognizer {
    fn open(&self, locale: &str) -> Result<mpsc::Receiver<TranscriptEvent>, VoiceError> {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let mut guard = self
            .sender
            .lock()
            .map_err(|e| VoiceError::RecognitionStreamError(e.to_string()))?;
        *guard = Some(tx);
        tracing::debug!(locale, "Channel recognizer opened");
        Ok(rx)
    }
}

/// Writer side of a [`ChannelRecognizer`] stream.
#[derive(Debug, Clone)]
pub struct TranscriptFeed {
    tx: mpsc::Sender<TranscriptEvent>,
}

impl TranscriptFeed {
    /// Push one transcript segment. Returns `false` if the stream is gone.
    pub async fn push(&self, text: impl Into<String>) -> bool {
        self.tx
            .send(TranscriptEvent::Segment(text.into()))
            .await
            .is_ok()
    }

    /// Break the stream with `reason`.
    pub async fn fail(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(TranscriptEvent::Error(reason.into()))
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_before_open_is_none() {
        let recognizer = ChannelRecognizer::new();
        assert!(recognizer.feed().is_none());
    }

    #[tokio::test]
    async fn test_feed_delivers_segments() {
        let recognizer = ChannelRecognizer::new();
        let mut rx = recognizer.open("en-US").unwrap();
        let feed = recognizer.feed().unwrap();

        assert!(feed.push("please help").await);
        assert!(feed.fail("mic unplugged").await);

        assert_eq!(
            rx.recv().await,
            Some(TranscriptEvent::Segment("please help".to_string()))
        );
        assert_eq!(
            rx.recv().await,
            Some(TranscriptEvent::Error("mic unplugged".to_string()))
        );
    }

    #[tokio::test]
    async fn test_reopen_replaces_stream() {
        let recognizer = ChannelRecognizer::new();
        let first = recognizer.open("en-US").unwrap();
        let stale = recognizer.feed().unwrap();
        drop(first);

        let mut second = recognizer.open("en-US").unwrap();
        assert!(!stale.push("lost").await);

        let feed = recognizer.feed().unwrap();
        assert!(feed.push("kept").await);
        assert_eq!(
            second.recv().await,
            Some(TranscriptEvent::Segment("kept".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let recognizer = ChannelRecognizer::new();
        let mut rx = recognizer.open("en-US").unwrap();
        recognizer.close();
        assert!(recognizer.feed().is_none());
        assert_eq!(rx.recv().await, None);
    }
}
