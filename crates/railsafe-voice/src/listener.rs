//! Voice keyword listener.
//!
//! Wraps a [`SpeechRecognizer`] stream, matches every segment against the
//! configured trigger phrases, and reports at most one detection per segment
//! through a callback. Recognition failures are logged and reflected in
//! [`ListenerStatus`]; the listener never restarts itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use railsafe_core::config::VoiceListenerConfig;
use railsafe_core::events::DomainEvent;
use railsafe_core::types::Timestamp;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::VoiceError;
use crate::matcher::KeywordMatcher;
use crate::recognizer::{SpeechRecognizer, TranscriptEvent};

/// Called once per transcript segment that contains a trigger phrase.
pub type KeywordCallback = Arc<dyn Fn(KeywordDetection) + Send + Sync>;

/// A trigger phrase heard in a transcript segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordDetection {
    pub phrase: String,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStatus {
    Stopped,
    Running,
    /// The recognition stream broke. Stays here until started again.
    Failed(String),
    /// No recognizer on this platform.
    Unavailable,
}

impl std::fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerStatus::Stopped => write!(f, "stopped"),
            ListenerStatus::Running => write!(f, "running"),
            ListenerStatus::Failed(reason) => write!(f, "failed: {}", reason),
            ListenerStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Start/stop surface driven by the listener supervisor.
pub trait KeywordListener: Send {
    /// Start listening with `config`. Restarts if already running. Does
    /// nothing but stop when `config.enabled` is false.
    fn start(&mut self, config: &VoiceListenerConfig, on_keyword: KeywordCallback);

    /// Stop listening. No callback fires after this returns.
    fn stop(&mut self);

    fn status(&self) -> ListenerStatus;
}

/// Listener backed by a real recognizer.
pub struct PlatformKeywordListener<R> {
    recognizer: Arc<R>,
    task: Option<JoinHandle<()>>,
    status: Arc<Mutex<ListenerStatus>>,
    generation: Arc<AtomicU64>,
    events: Option<broadcast::Sender<DomainEvent>>,
}

impl<R: SpeechRecognizer + 'static> PlatformKeywordListener<R> {
    pub fn new(recognizer: Arc<R>) -> Self {
        Self {
            recognizer,
            task: None,
            status: Arc::new(Mutex::new(ListenerStatus::Stopped)),
            generation: Arc::new(AtomicU64::new(0)),
            events: None,
        }
    }

    /// Also publish listener lifecycle and detections as domain events.
    pub fn with_events(mut self, events: broadcast::Sender<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn halt_stream(&mut self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl<R: SpeechRecognizer + 'static> KeywordListener for PlatformKeywordListener<R> {
    fn start(&mut self, config: &VoiceListenerConfig, on_keyword: KeywordCallback) {
        if !config.enabled {
            self.stop();
            return;
        }
        if self.halt_stream() {
            debug!("Restarting keyword listener");
        }

        let matcher = KeywordMatcher::new(&config.trigger_phrases);
        if matcher.is_empty() {
            warn!("No usable trigger phrases configured, keyword listener stays stopped");
            set_status(&self.status, ListenerStatus::Stopped);
            return;
        }

        let rx = match self.recognizer.open(&config.locale) {
            Ok(rx) => rx,
            Err(e) => {
                warn!(locale = %config.locale, "Speech recognition could not start: {}", e);
                let status = match e {
                    VoiceError::RecognitionUnavailable => ListenerStatus::Unavailable,
                    VoiceError::RecognitionStreamError(reason) => ListenerStatus::Failed(reason),
                };
                set_status(&self.status, status);
                return;
            }
        };

        let generation = self.generation.load(Ordering::SeqCst);
        set_status(&self.status, ListenerStatus::Running);
        publish(
            &self.events,
            DomainEvent::ListenerStarted {
                locale: config.locale.clone(),
                timestamp: Timestamp::now(),
            },
        );
        info!(
            locale = %config.locale,
            phrases = matcher.phrases().len(),
            "Keyword listener started"
        );

        let stream = KeywordStream {
            matcher,
            on_keyword,
            generation,
            current: Arc::clone(&self.generation),
            status: Arc::clone(&self.status),
            events: self.events.clone(),
        };
        self.task = Some(tokio::spawn(stream.run(rx)));
    }

    fn stop(&mut self) {
        if self.halt_stream() {
            publish(
                &self.events,
                DomainEvent::ListenerStopped {
                    reason: "stopped".to_string(),
                    timestamp: Timestamp::now(),
                },
            );
            info!("Keyword listener stopped");
        }
        set_status(&self.status, ListenerStatus::Stopped);
    }

    fn status(&self) -> ListenerStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl<R> Drop for PlatformKeywordListener<R> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State moved into the spawned recognition task.
struct KeywordStream {
    matcher: KeywordMatcher,
    on_keyword: KeywordCallback,
    generation: u64,
    current: Arc<AtomicU64>,
    status: Arc<Mutex<ListenerStatus>>,
    events: Option<broadcast::Sender<DomainEvent>>,
}

impl KeywordStream {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    async fn run(self, mut rx: mpsc::Receiver<TranscriptEvent>) {
        while let Some(event) = rx.recv().await {
            if !self.is_current() {
                return;
            }
            match event {
                TranscriptEvent::Segment(transcript) => {
                    let Some(phrase) = self.matcher.find(&transcript) else {
                        continue;
                    };
                    let phrase = phrase.to_string();
                    info!(phrase = %phrase, "Trigger phrase detected");
                    publish(
                        &self.events,
                        DomainEvent::KeywordDetected {
                            phrase: phrase.clone(),
                            transcript: transcript.clone(),
                            timestamp: Timestamp::now(),
                        },
                    );
                    (self.on_keyword)(KeywordDetection { phrase, transcript });
                }
                TranscriptEvent::Error(reason) => {
                    warn!(reason = %reason, "Recognition stream error, keyword listener stopped");
                    self.finish(ListenerStatus::Failed(reason.clone()), reason);
                    return;
                }
            }
        }
        if self.is_current() {
            debug!("Recognition stream ended");
            self.finish(ListenerStatus::Stopped, "stream ended".to_string());
        }
    }

    /// Record how the stream ended. A stream superseded by a restart or stop
    /// leaves the status alone.
    fn finish(&self, status: ListenerStatus, reason: String) {
        {
            let mut slot = self
                .status
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !self.is_current() {
                debug!("Superseded recognition stream ended");
                return;
            }
            *slot = status;
        }
        publish(
            &self.events,
            DomainEvent::ListenerStopped {
                reason,
                timestamp: Timestamp::now(),
            },
        );
    }
}

/// Listener for platforms without speech recognition. Never emits.
#[derive(Debug, Default)]
pub struct NoopKeywordListener;

impl KeywordListener for NoopKeywordListener {
    fn start(&mut self, config: &VoiceListenerConfig, _on_keyword: KeywordCallback) {
        if config.enabled {
            info!("Speech recognition unavailable, voice commands disabled");
        }
    }

    fn stop(&mut self) {}

    fn status(&self) -> ListenerStatus {
        ListenerStatus::Unavailable
    }
}

/// Pick the listener for this platform: the recognizer-backed one when a
/// recognizer exists, the no-op one otherwise.
pub fn keyword_listener_for<R: SpeechRecognizer + 'static>(
    recognizer: Option<Arc<R>>,
    events: Option<broadcast::Sender<DomainEvent>>,
) -> Box<dyn KeywordListener> {
    match recognizer {
        Some(recognizer) => {
            let listener = PlatformKeywordListener::new(recognizer);
            match events {
                Some(events) => Box::new(listener.with_events(events)),
                None => Box::new(listener),
            }
        }
        None => Box::new(NoopKeywordListener),
    }
}

fn set_status(slot: &Mutex<ListenerStatus>, status: ListenerStatus) {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
}

fn publish(events: &Option<broadcast::Sender<DomainEvent>>, event: DomainEvent) {
    if let Some(tx) = events {
        // No subscribers is fine.
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::ChannelRecognizer;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn enabled_config() -> VoiceListenerConfig {
        VoiceListenerConfig {
            enabled: true,
            ..VoiceListenerConfig::default()
        }
    }

    fn collecting_callback() -> (KeywordCallback, UnboundedReceiver<KeywordDetection>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: KeywordCallback = Arc::new(move |detection: KeywordDetection| {
            let _ = tx.send(detection);
        });
        (callback, rx)
    }

    async fn wait_for_status(listener: &dyn KeywordListener, expected: ListenerStatus) {
        for _ in 0..100 {
            if listener.status() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("listener never reached {:?}, is {:?}", expected, listener.status());
    }

    struct UnavailableRecognizer;

    impl SpeechRecognizer for UnavailableRecognizer {
        fn open(&self, _locale: &str) -> Result<mpsc::Receiver<TranscriptEvent>, VoiceError> {
            Err(VoiceError::RecognitionUnavailable)
        }
    }

    // =========================================================================
    // Detection
    // =========================================================================

    #[tokio::test]
    async fn test_detects_phrase_once_per_segment() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, mut detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        assert_eq!(listener.status(), ListenerStatus::Running);

        let feed = recognizer.feed().unwrap();
        feed.push("hello there").await;
        feed.push("please HELP me now").await;
        feed.push("help help bachao").await;

        let first = detections.recv().await.unwrap();
        assert_eq!(first.phrase, "help");
        assert_eq!(first.transcript, "please HELP me now");

        let second = detections.recv().await.unwrap();
        assert_eq!(second.transcript, "help help bachao");

        assert!(
            tokio::time::timeout(Duration::from_millis(50), detections.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_publishes_domain_events() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let (events_tx, mut events_rx) = broadcast::channel(16);
        let mut listener =
            PlatformKeywordListener::new(Arc::clone(&recognizer)).with_events(events_tx);
        let (callback, mut detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        recognizer.feed().unwrap().push("bachao").await;
        detections.recv().await.unwrap();

        let started = events_rx.recv().await.unwrap();
        assert_eq!(started.event_name(), "listener_started");
        let detected = events_rx.recv().await.unwrap();
        assert!(matches!(
            detected,
            DomainEvent::KeywordDetected { ref phrase, .. } if phrase == "bachao"
        ));

        listener.stop();
        let stopped = events_rx.recv().await.unwrap();
        assert_eq!(stopped.event_name(), "listener_stopped");
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_start_disabled_stays_stopped() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, _detections) = collecting_callback();

        listener.start(&VoiceListenerConfig::default(), callback);
        assert_eq!(listener.status(), ListenerStatus::Stopped);
        assert!(recognizer.feed().is_none());
    }

    #[tokio::test]
    async fn test_no_callback_after_stop() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, mut detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        let feed = recognizer.feed().unwrap();
        listener.stop();
        assert_eq!(listener.status(), ListenerStatus::Stopped);

        feed.push("help").await;
        assert!(
            tokio::time::timeout(Duration::from_millis(50), detections.recv())
                .await
                .map(|d| d.is_none())
                .unwrap_or(true)
        );
    }

    #[tokio::test]
    async fn test_start_twice_restarts_single_stream() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, mut detections) = collecting_callback();

        listener.start(&enabled_config(), Arc::clone(&callback));
        listener.start(&enabled_config(), callback);
        assert_eq!(listener.status(), ListenerStatus::Running);

        recognizer.feed().unwrap().push("help").await;
        assert_eq!(detections.recv().await.unwrap().phrase, "help");
        assert!(
            tokio::time::timeout(Duration::from_millis(50), detections.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_empty_phrases_never_start() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, _detections) = collecting_callback();

        let config = VoiceListenerConfig {
            enabled: true,
            trigger_phrases: vec!["  ".to_string()],
            ..VoiceListenerConfig::default()
        };
        listener.start(&config, callback);
        assert_eq!(listener.status(), ListenerStatus::Stopped);
        assert!(recognizer.feed().is_none());
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[tokio::test]
    async fn test_stream_error_marks_failed() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, mut detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        let feed = recognizer.feed().unwrap();
        feed.fail("no-speech").await;

        wait_for_status(&listener, ListenerStatus::Failed("no-speech".to_string())).await;
        assert!(!feed.push("help").await);
        assert!(detections.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_end_marks_stopped() {
        let recognizer = Arc::new(ChannelRecognizer::new());
        let mut listener = PlatformKeywordListener::new(Arc::clone(&recognizer));
        let (callback, _detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        recognizer.close();
        wait_for_status(&listener, ListenerStatus::Stopped).await;
    }

    #[tokio::test]
    async fn test_superseded_stream_keeps_new_status() {
        let status = Arc::new(Mutex::new(ListenerStatus::Running));
        let current = Arc::new(AtomicU64::new(2));
        let (events, mut event_rx) = broadcast::channel(8);
        let (callback, _detections) = collecting_callback();
        let stale = KeywordStream {
            matcher: KeywordMatcher::new(["help"]),
            on_keyword: callback,
            generation: 1,
            current: Arc::clone(&current),
            status: Arc::clone(&status),
            events: Some(events),
        };

        stale.finish(ListenerStatus::Failed("aborted".to_string()), "aborted".to_string());
        assert_eq!(*status.lock().unwrap(), ListenerStatus::Running);
        assert!(event_rx.try_recv().is_err());

        current.store(1, Ordering::SeqCst);
        stale.finish(ListenerStatus::Failed("aborted".to_string()), "aborted".to_string());
        assert_eq!(
            *status.lock().unwrap(),
            ListenerStatus::Failed("aborted".to_string())
        );
        assert_eq!(event_rx.try_recv().unwrap().event_name(), "listener_stopped");
    }

    #[tokio::test]
    async fn test_unavailable_recognizer() {
        let mut listener = PlatformKeywordListener::new(Arc::new(UnavailableRecognizer));
        let (callback, _detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        assert_eq!(listener.status(), ListenerStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_noop_listener() {
        let mut listener = keyword_listener_for::<ChannelRecognizer>(None, None);
        let (callback, _detections) = collecting_callback();

        listener.start(&enabled_config(), callback);
        assert_eq!(listener.status(), ListenerStatus::Unavailable);
        listener.stop();
        assert_eq!(listener.status(), ListenerStatus::Unavailable);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ListenerStatus::Running.to_string(), "running");
        assert_eq!(
            ListenerStatus::Failed("aborted".to_string()).to_string(),
            "failed: aborted"
        );
    }
}
