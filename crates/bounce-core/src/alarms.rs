//! Named one-shot timers.
//!
//! Timers are the only autonomous trigger in the system. Each is keyed by a
//! unique name; creating a timer under an existing name replaces it, and
//! firing delivers the name back to the owner over a channel. Schedules live
//! in memory only -- loss across a process restart is expected and repaired
//! by the reconciliation pass, not by the timer layer.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Cancellable named one-shot timers.
pub trait AlarmScheduler: Send + Sync {
    /// Schedule (or reschedule) the alarm `name` to fire at `when_ms`
    /// (absolute epoch millis). Past-due alarms fire immediately.
    fn create(&self, name: &str, when_ms: i64);

    /// Cancel the alarm `name`. Returns whether it was pending.
    fn clear(&self, name: &str) -> bool;

    /// Cancel every pending alarm.
    fn clear_all(&self);
}

/// Tokio-backed scheduler delivering fired alarm names on a channel.
///
/// `create` must be called from within a tokio runtime.
pub struct TokioAlarmScheduler {
    fired_tx: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl TokioAlarmScheduler {
    /// Build a scheduler and the receiver its firings arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                fired_tx,
                pending: Arc::new(Mutex::new(HashMap::new())),
            },
            fired_rx,
        )
    }
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn create(&self, name: &str, when_ms: i64) {
        let delay_ms = (when_ms - Utc::now().timestamp_millis()).max(0) as u64;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = pending.remove(name) {
            old.abort();
        }

        let tx = self.fired_tx.clone();
        let registry = Arc::clone(&self.pending);
        let alarm = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&alarm);
            // Receiver gone means the service loop is shutting down.
            let _ = tx.send(alarm);
        });
        pending.insert(name.to_string(), handle);
        trace!(name, delay_ms, "alarm scheduled");
    }

    fn clear(&self, name: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.remove(name) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn clear_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}

/// Deterministic scheduler for tests and one-shot hosts.
///
/// Records schedules without running anything; the caller decides when an
/// alarm "fires" by feeding its name to the alarm handler.
#[derive(Debug, Default)]
pub struct ManualAlarmScheduler {
    pending: Mutex<BTreeMap<String, i64>>,
}

impl ManualAlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the alarm `name` is due, if pending.
    pub fn scheduled_at(&self, name: &str) -> Option<i64> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Names of all pending alarms, in order.
    pub fn pending_names(&self) -> Vec<String> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlarmScheduler for ManualAlarmScheduler {
    fn create(&self, name: &str, when_ms: i64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), when_ms);
    }

    fn clear(&self, name: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    fn clear_all(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
