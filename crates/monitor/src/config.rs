//! Layered application configuration
//!
//! Defaults, then an optional TOML/YAML/JSON file, then environment
//! variables such as `DROWSY__DMS__EAR_THRESHOLD=0.22`, then command-line
//! [`Overrides`].

use std::path::Path;

use alerting::{AlertConfig, SinkKind};
use camera_capture::CameraConfig;
use ::config::{Config, ConfigError, Environment, File, Map};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::MonitorError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Parsed `level`; unknown names are an error rather than a silent default
    pub fn max_level(&self) -> Result<Level, MonitorError> {
        self.level
            .parse::<Level>()
            .map_err(|_| MonitorError::LogLevel(self.level.clone()))
    }
}

/// Whole-application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dms: DmsConfig,
    pub alerting: AlertConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
    /// Pace replayed frames at `camera.fps` instead of running flat out
    pub realtime: bool,
}

/// Values given on the command line. Set fields win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ear_threshold: Option<f32>,
    pub consec_frames: Option<u32>,
    pub sink: Option<SinkKind>,
    pub realtime: bool,
    pub json_logs: bool,
}

impl AppConfig {
    /// Load defaults, the optional file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`AppConfig::load`], reading `DROWSY__*` variables from `env`
    /// instead of the process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }

    /// Apply command-line values on top of the loaded layers
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(threshold) = overrides.ear_threshold {
            self.dms.ear_threshold = threshold;
        }
        if let Some(frames) = overrides.consec_frames {
            self.dms.consec_frames = frames;
        }
        if let Some(sink) = overrides.sink {
            self.alerting.sink = sink;
        }
        self.realtime |= overrides.realtime;
        self.logging.json |= overrides.json_logs;
    }
}
