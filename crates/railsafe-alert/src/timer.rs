//! Cancellable one-second countdown timer.
//!
//! A run of `start(n, on_tick, on_expire)` calls `on_tick(n)`, `on_tick(n - 1)`,
//! ... `on_tick(0)` one second apart, starting immediately, then `on_expire()`
//! once. `cancel()` ends the run; no callback from that run fires afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::TimerError;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct CountdownTimer {
    task: Option<JoinHandle<()>>,
    generation: Arc<AtomicU64>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start a run of `duration_secs + 1` ticks followed by one expiry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T, E>(
        &mut self,
        duration_secs: u32,
        on_tick: T,
        on_expire: E,
    ) -> Result<(), TimerError>
    where
        T: Fn(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        if self.is_running() {
            return Err(TimerError::AlreadyRunning);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for remaining in (0..=duration_secs).rev() {
                interval.tick().await;
                if current.load(Ordering::SeqCst) != generation {
                    return;
                }
                on_tick(remaining);
            }
            if current.load(Ordering::SeqCst) == generation {
                on_expire();
            }
        }));
        Ok(())
    }

    /// Stop the current run, if any. Returns whether a run was stopped.
    pub fn cancel(&mut self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.task.take() {
            Some(task) => {
                let was_running = !task.is_finished();
                task.abort();
                was_running
            }
            None => false,
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
