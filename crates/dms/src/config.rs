//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::tracker::SubjectPolicy;
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Mean EAR below this counts as a closed-eye frame
    pub ear_threshold: f32,

    /// Consecutive closed-eye frames before the alert starts
    pub consec_frames: u32,

    /// How faces map onto tracked subjects
    pub subject_policy: SubjectPolicy,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.25,
            consec_frames: 20,
            subject_policy: SubjectPolicy::Single,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alerts sooner)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.27,
            consec_frames: 15,
            ..Default::default()
        }
    }

    /// Create lenient config (alerts later)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.22,
            consec_frames: 30,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.ear_threshold.is_finite() || self.ear_threshold <= 0.0 {
            return Err(DmsError::Config(format!(
                "ear_threshold must be a positive number, got {}",
                self.ear_threshold
            )));
        }
        if self.consec_frames == 0 {
            return Err(DmsError::Config("consec_frames must be at least 1".into()));
        }
        if let SubjectPolicy::Nearest { max_match_distance, .. } = self.subject_policy {
            if !max_match_distance.is_finite() || max_match_distance <= 0.0 {
                return Err(DmsError::Config(format!(
                    "max_match_distance must be positive, got {}",
                    max_match_distance
                )));
            }
        }
        Ok(())
    }
}
