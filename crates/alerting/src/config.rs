//! Alert configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sink::{AlertSink, BellSink, LogSink, SpeechSink};

/// Which sink renders alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Log line only
    #[default]
    Log,
    /// Terminal bell plus message on stderr
    Bell,
    /// External text-to-speech program
    Speech,
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub sink: SinkKind,
    /// Spoken / displayed text
    pub message: String,
    /// Text-to-speech program (espeak-compatible flags)
    pub speech_program: String,
    /// Words per minute
    pub speech_rate: u32,
    /// Volume, 0.0 to 1.0
    pub volume: f32,
    /// Re-trigger playback on every alerting frame once the previous one ends
    pub repeat_while_alerting: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Log,
            message: "Wake up! You seem to be drowsy!".to_string(),
            speech_program: "espeak".to_string(),
            speech_rate: 150,
            volume: 0.9,
            repeat_while_alerting: false,
        }
    }
}

impl AlertConfig {
    /// Instantiate the configured sink
    pub fn build_sink(&self) -> Arc<dyn AlertSink> {
        match self.sink {
            SinkKind::Log => Arc::new(LogSink),
            SinkKind::Bell => Arc::new(BellSink),
            SinkKind::Speech => Arc::new(SpeechSink::new(
                self.speech_program.clone(),
                self.speech_rate,
                self.volume,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AlertConfig::default();
        assert_eq!(config.sink, SinkKind::Log);
        assert_eq!(config.speech_rate, 150);
        assert!((config.volume - 0.9).abs() < f32::EPSILON);
        assert!(!config.repeat_while_alerting);
    }

    #[test]
    fn test_sink_kind_from_json() {
        let config: AlertConfig = serde_json::from_str(r#"{"sink": "speech"}"#).unwrap();
        assert_eq!(config.sink, SinkKind::Speech);
        assert_eq!(config.build_sink().name(), "speech");
        assert_eq!(config.message, "Wake up! You seem to be drowsy!");
    }
}
