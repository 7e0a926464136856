//! Non-blocking alert dispatch
//!
//! Playback runs on Tokio's blocking pool so the frame loop never waits on
//! audio. A single in-flight flag makes triggers idempotent: while one
//! playback runs, further triggers are dropped, not queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::sink::AlertSink;
use crate::Alert;

/// Result of [`AlertDispatcher::trigger_alert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Playback handed to the worker
    Dispatched,
    /// A playback was already in flight; nothing was done
    Suppressed,
}

/// Dispatch counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub suppressed: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    suppressed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// In-flight flag plus a wakeup for [`AlertDispatcher::wait_idle`]
#[derive(Default)]
struct Playback {
    playing: AtomicBool,
    idle: Notify,
}

/// Clears the in-flight flag when playback ends, panics included
struct InFlight(Arc<Playback>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.playing.store(false, Ordering::Release);
        self.0.idle.notify_waiters();
    }
}

/// Hands alerts to a sink without blocking the caller
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    playback: Arc<Playback>,
    counters: Arc<Counters>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        info!("Alert dispatcher using {} sink", sink.name());
        Self {
            sink,
            playback: Arc::new(Playback::default()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Start playback unless one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger_alert(&self, alert: Alert) -> DispatchOutcome {
        if self
            .playback
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("alert_dispatch_suppressed_total").increment(1);
            debug!(source = %alert.source, "Playback in flight, trigger ignored");
            return DispatchOutcome::Suppressed;
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("alert_dispatch_total").increment(1);

        let guard = InFlight(Arc::clone(&self.playback));
        let sink = Arc::clone(&self.sink);
        let counters = Arc::clone(&self.counters);

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            match sink.play(&alert) {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(source = %alert.source, "Playback finished");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(source = %alert.source, sink = sink.name(), "Alert playback failed: {}", e);
                }
            }
        });

        DispatchOutcome::Dispatched
    }

    /// Alert for `source` went inactive
    pub fn clear(&self, source: &str) {
        self.sink.clear(source);
    }

    /// Whether a playback is running
    pub fn is_playing(&self) -> bool {
        self.playback.playing.load(Ordering::Acquire)
    }

    /// Wait until no playback is running. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                // Register before checking the flag so a drop in between still wakes us
                let notified = self.playback.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if !self.is_playing() {
                    break;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }
}
