//! DMS analysis results and alert transitions

use serde::{Deserialize, Serialize};

use crate::landmarks::FaceRegion;
use crate::state::DrowsinessState;
use crate::tracker::SubjectId;

/// Alert edge for one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertTransition {
    /// Eyes stayed closed long enough; alert becomes active
    Started {
        subject: SubjectId,
        /// Counter value at the rising edge
        counter: u32,
        /// Mean EAR of the frame that crossed the threshold
        ear: f32,
    },

    /// Eyes reopened (or the subject left); alert cleared
    Stopped { subject: SubjectId },
}

impl AlertTransition {
    pub fn subject(&self) -> SubjectId {
        match self {
            AlertTransition::Started { subject, .. } | AlertTransition::Stopped { subject } => {
                *subject
            }
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, AlertTransition::Started { .. })
    }
}

/// Result for one face in one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceReading {
    pub subject: SubjectId,
    pub region: FaceRegion,

    /// Per-eye EAR, absent when that eye's geometry was degenerate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_ear: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_ear: Option<f32>,

    /// Signal fed to the state machine; absent means no update this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ear: Option<f32>,

    /// Counter after this frame
    pub counter: u32,
    pub state: DrowsinessState,
}

/// Complete analysis of one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub sequence: u32,
    pub timestamp_ns: u64,

    /// Whether any face was detected
    pub face_detected: bool,

    pub readings: Vec<FaceReading>,

    /// Edges crossed during this frame
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<AlertTransition>,

    /// Any subject alerting after this frame
    pub alert_active: bool,
}

impl FrameAnalysis {
    pub fn new(sequence: u32, timestamp_ns: u64) -> Self {
        Self {
            sequence,
            timestamp_ns,
            ..Default::default()
        }
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Lowest EAR among the faces of this frame
    pub fn min_ear(&self) -> Option<f32> {
        self.readings
            .iter()
            .filter_map(|r| r.ear)
            .min_by(|a, b| a.total_cmp(b))
    }
}
