//! Keeps a keyword listener in step with the voice listener config.

use railsafe_core::config::VoiceListenerConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::listener::{KeywordCallback, KeywordListener};

/// Spawn a task that starts `listener` when the config becomes enabled and
/// stops it when the config becomes disabled. Any other config change while
/// enabled restarts the listener with the new phrases or locale.
///
/// The listener is stopped when the config channel closes.
pub fn spawn_listener_supervisor(
    mut listener: Box<dyn KeywordListener>,
    mut config_rx: watch::Receiver<VoiceListenerConfig>,
    on_keyword: KeywordCallback,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut active: Option<VoiceListenerConfig> = None;
        loop {
            let config = config_rx.borrow_and_update().clone();
            match (&active, config.enabled) {
                (None, true) => {
                    listener.start(&config, on_keyword.clone());
                    active = Some(config);
                }
                (Some(current), true) if *current != config => {
                    debug!("Voice config changed, restarting listener");
                    listener.start(&config, on_keyword.clone());
                    active = Some(config);
                }
                (Some(_), false) => {
                    listener.stop();
                    active = None;
                }
                _ => {}
            }

            if config_rx.changed().await.is_err() {
                break;
            }
        }
        if active.is_some() {
            listener.stop();
        }
        debug!("Listener supervisor exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{KeywordDetection, ListenerStatus};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingListener {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl KeywordListener for RecordingListener {
        fn start(&mut self, config: &VoiceListenerConfig, _on_keyword: KeywordCallback) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("start:{}", config.trigger_phrases.join(",")));
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop".to_string());
        }

        fn status(&self) -> ListenerStatus {
            ListenerStatus::Stopped
        }
    }

    fn noop_callback() -> KeywordCallback {
        Arc::new(|_: KeywordDetection| {})
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_toggle_starts_and_stops() {
        let listener = RecordingListener::default();
        let calls = Arc::clone(&listener.calls);
        let (tx, rx) = watch::channel(VoiceListenerConfig::default());

        let handle = spawn_listener_supervisor(Box::new(listener), rx, noop_callback());
        settle().await;
        assert!(calls.lock().unwrap().is_empty());

        tx.send_modify(|cfg| cfg.enabled = true);
        settle().await;
        tx.send_modify(|cfg| cfg.enabled = false);
        settle().await;

        assert_eq!(*calls.lock().unwrap(), vec!["start:help,bachao", "stop"]);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_phrase_change_while_enabled_restarts() {
        let listener = RecordingListener::default();
        let calls = Arc::clone(&listener.calls);
        let (tx, rx) = watch::channel(VoiceListenerConfig {
            enabled: true,
            ..VoiceListenerConfig::default()
        });

        let handle = spawn_listener_supervisor(Box::new(listener), rx, noop_callback());
        settle().await;
        tx.send_modify(|cfg| cfg.trigger_phrases = vec!["save me".to_string()]);
        settle().await;

        drop(tx);
        handle.await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["start:help,bachao", "start:save me", "stop"]
        );
    }

    #[tokio::test]
    async fn test_channel_close_while_disabled_does_not_stop() {
        let listener = RecordingListener::default();
        let calls = Arc::clone(&listener.calls);
        let (tx, rx) = watch::channel(VoiceListenerConfig::default());

        let handle = spawn_listener_supervisor(Box::new(listener), rx, noop_callback());
        drop(tx);
        handle.await.unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }
}
