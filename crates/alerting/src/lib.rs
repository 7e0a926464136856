//! Alerting System
//!
//! Renders drowsiness alerts through pluggable sinks and keeps playback off
//! the frame loop, with at most one playback in flight.

mod config;
mod dispatcher;
mod sink;

pub use config::{AlertConfig, SinkKind};
pub use dispatcher::{AlertDispatcher, DispatchOutcome, DispatchStats};
pub use sink::{AlertSink, BellSink, LogSink, RecordingSink, SpeechSink};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by alert sinks
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One alert to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Who the alert is about (e.g. "subject-0")
    pub source: String,
    /// Text spoken or shown
    pub message: String,
    /// Timestamp of the frame that raised it (nanoseconds)
    pub raised_at_ns: u64,
}

impl Alert {
    pub fn new(source: impl Into<String>, message: impl Into<String>, raised_at_ns: u64) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            raised_at_ns,
        }
    }
}
