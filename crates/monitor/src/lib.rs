//! Drowsiness Monitor
//!
//! Application layer: configuration loading, logging setup and the
//! frame-processing session that drives the DMS core and the alert sinks.

pub mod config;
pub mod session;

pub use config::{AppConfig, LoggingConfig, Overrides};
pub use session::{MonitorSession, SessionSummary, StopReason};

use thiserror::Error;
use tracing_subscriber::FmtSubscriber;

/// Application error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Frame source error: {0}")]
    Camera(#[from] camera_capture::CameraError),

    #[error("Drowsiness detection error: {0}")]
    Dms(#[from] dms::DmsError),

    #[error("Failed to write analysis: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown log level {0:?}")]
    LogLevel(String),

    #[error("Logging already initialized: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize the global tracing subscriber. Logs go to stderr so stdout
/// stays free for analysis output.
pub fn init_logging(config: &LoggingConfig) -> Result<(), MonitorError> {
    let level = config.max_level()?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
