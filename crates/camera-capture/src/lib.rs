//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides frame acquisition behind the [`FrameSource`] trait.
//! Supports:
//! - Image sequences on disk (one still per frame, sorted by file name)
//! - Blank frames for landmark-only replay sessions

pub mod frame;
pub mod source;

pub use frame::{PixelFormat, VideoFrame};
pub use source::{BlankSource, FrameSource, ImageDirSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open frame source: {0}")]
    Open(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Invalid frame size {width}x{height} (each side must be 1..={max})")]
    InvalidDimensions { width: u32, height: u32, max: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Largest accepted frame side, in pixels
pub const MAX_DIMENSION: u32 = 8192;

/// Reject zero or oversized frame sizes before any buffer is allocated
pub fn check_dimensions(width: u32, height: u32) -> Result<(), CameraError> {
    let valid = |side: u32| (1..=MAX_DIMENSION).contains(&side);
    if valid(width) && valid(height) {
        Ok(())
    } else {
        Err(CameraError::InvalidDimensions {
            width,
            height,
            max: MAX_DIMENSION,
        })
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Processing width (frames are resized to this)
    pub width: u32,
    /// Processing height
    pub height: u32,
    /// Target FPS, used for timestamps and realtime pacing
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 15,
        }
    }
}

impl CameraConfig {
    /// Nominal interval between frames in nanoseconds
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }

    /// Check the processing size
    pub fn validate(&self) -> Result<(), CameraError> {
        check_dimensions(self.width, self.height)
    }
}
