//! Alert sinks

use std::io::Write;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{Alert, AlertError};

/// Something that renders an alert.
///
/// `play` may block for as long as playback lasts; the dispatcher runs it
/// off the frame loop.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    fn play(&self, alert: &Alert) -> Result<(), AlertError>;

    /// Alert for `source` is no longer active
    fn clear(&self, _source: &str) {}
}

/// Writes alerts to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn play(&self, alert: &Alert) -> Result<(), AlertError> {
        warn!(source = %alert.source, "{}", alert.message);
        Ok(())
    }

    fn clear(&self, source: &str) {
        info!(source, "Alert cleared");
    }
}

/// Rings the terminal bell and prints the message on stderr
#[derive(Debug, Default)]
pub struct BellSink;

impl AlertSink for BellSink {
    fn name(&self) -> &str {
        "bell"
    }

    fn play(&self, alert: &Alert) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "\x07DROWSINESS ALERT! {}", alert.message)?;
        stderr.flush()?;
        Ok(())
    }
}

/// Speaks the message through an espeak-compatible program
#[derive(Debug, Clone)]
pub struct SpeechSink {
    program: String,
    rate: u32,
    volume: f32,
}

impl SpeechSink {
    pub fn new(program: impl Into<String>, rate: u32, volume: f32) -> Self {
        Self {
            program: program.into(),
            rate,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    /// Arguments passed to the program: rate, amplitude (0-200), text
    pub fn args(&self, message: &str) -> Vec<String> {
        let amplitude = (self.volume * 200.0).round() as u32;
        vec![
            "-s".to_string(),
            self.rate.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
            message.to_string(),
        ]
    }
}

impl AlertSink for SpeechSink {
    fn name(&self) -> &str {
        "speech"
    }

    fn play(&self, alert: &Alert) -> Result<(), AlertError> {
        debug!(program = %self.program, "Speaking alert");
        let status = Command::new(&self.program)
            .args(self.args(&alert.message))
            .status()
            .map_err(|source| AlertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(AlertError::Playback(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}

/// Records alerts in memory, optionally holding each playback for a while
#[derive(Debug, Default)]
pub struct RecordingSink {
    hold: Duration,
    played: Mutex<Vec<Alert>>,
    cleared: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each playback blocks for `hold`
    pub fn with_hold(hold: Duration) -> Self {
        Self {
            hold,
            ..Default::default()
        }
    }

    pub fn played(&self) -> Vec<Alert> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn clear_count(&self) -> usize {
        self.cleared.load(Ordering::Relaxed)
    }
}

impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn play(&self, alert: &Alert) -> Result<(), AlertError> {
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        self.played
            .lock()
            .map_err(|_| AlertError::Playback("recording sink poisoned".into()))?
            .push(alert.clone());
        Ok(())
    }

    fn clear(&self, _source: &str) {
        self.cleared.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_args() {
        let sink = SpeechSink::new("espeak", 150, 0.9);
        assert_eq!(
            sink.args("Wake up!"),
            vec!["-s", "150", "-a", "180", "Wake up!"]
        );

        let loud = SpeechSink::new("espeak", 120, 4.0);
        assert_eq!(loud.args("x")[3], "200");
    }

    #[test]
    fn test_missing_speech_program() {
        let sink = SpeechSink::new("definitely-not-a-tts-binary", 150, 0.9);
        let err = sink.play(&Alert::new("subject-0", "hello", 0)).unwrap_err();
        assert!(matches!(err, AlertError::Spawn { .. }));
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.play(&Alert::new("subject-0", "one", 1)).unwrap();
        sink.play(&Alert::new("subject-1", "two", 2)).unwrap();
        sink.clear("subject-0");

        assert_eq!(sink.play_count(), 2);
        assert_eq!(sink.played()[1].source, "subject-1");
        assert_eq!(sink.clear_count(), 1);
    }
}
