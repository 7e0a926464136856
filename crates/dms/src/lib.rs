//! Driver Monitoring System (DMS)
//!
//! Real-time drowsiness detection from facial landmarks:
//! - Eye aspect ratio (EAR) from 6-point eye contours
//! - 68-point landmark slicing and a pluggable landmark provider
//! - Consecutive-frame drowsiness state machine per tracked subject
//!
//! Frames with no detected face leave every counter untouched: a momentary
//! detection loss neither resets nor advances progress toward an alert.

pub mod analysis;
pub mod config;
pub mod geometry;
pub mod landmarks;
pub mod replay;
pub mod state;
pub mod tracker;

pub use analysis::{AlertTransition, FaceReading, FrameAnalysis};
pub use config::DmsConfig;
pub use geometry::{eye_aspect_ratio, mean_ear, EyeContour, Point2};
pub use landmarks::{FaceLandmarks, FaceObservation, FaceRegion, LandmarkProvider};
pub use replay::{ReplayLandmarkProvider, TraceFace, TraceRecord};
pub use state::{DrowsinessCounter, DrowsinessState, StateChange};
pub use tracker::{SubjectId, SubjectPolicy, SubjectRegistry};

use camera_capture::VideoFrame;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Degenerate eye geometry (corner distance {0})")]
    DegenerateGeometry(f32),

    #[error("Eye contour needs 6 points, got {0}")]
    InvalidContour(usize),

    #[error("Face landmarks need 68 points, got {0}")]
    InvalidLandmarks(usize),

    #[error("Landmark trace line {line}: {reason}")]
    Trace { line: usize, reason: String },

    #[error("Landmark provider failed: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStats {
    pub frames: u64,
    pub frames_without_face: u64,
    pub faces: u64,
    /// Eyes whose EAR could not be computed
    pub degenerate_eyes: u64,
    /// Faces skipped because neither eye was usable
    pub skipped_faces: u64,
    pub alerts_started: u64,
    pub alerts_stopped: u64,
}

/// Drowsiness monitor: EAR per face, then the per-subject state machine
pub struct DrowsinessMonitor {
    config: DmsConfig,
    registry: SubjectRegistry,
    stats: MonitorStats,
}

impl DrowsinessMonitor {
    /// Create a new monitor with configuration
    pub fn new(config: DmsConfig) -> Result<Self, DmsError> {
        config.validate()?;
        info!(
            ear_threshold = config.ear_threshold,
            consec_frames = config.consec_frames,
            policy = ?config.subject_policy,
            "Drowsiness monitor ready"
        );
        Ok(Self {
            registry: SubjectRegistry::new(config.subject_policy),
            stats: MonitorStats::default(),
            config,
        })
    }

    /// Observe a frame through `provider` and update state
    pub fn analyze<P>(&mut self, provider: &mut P, frame: &VideoFrame) -> Result<FrameAnalysis, DmsError>
    where
        P: LandmarkProvider + ?Sized,
    {
        let faces = provider.observe(frame)?;
        Ok(self.process(frame, &faces))
    }

    /// Update state from already-extracted face observations
    pub fn process(&mut self, frame: &VideoFrame, faces: &[FaceObservation]) -> FrameAnalysis {
        self.stats.frames += 1;
        metrics::counter!("dms_frames_total").increment(1);

        let mut analysis = FrameAnalysis::new(frame.sequence, frame.timestamp_ns);

        if faces.is_empty() {
            self.stats.frames_without_face += 1;
            debug!(frame = frame.sequence, "No face detected, state held");
            analysis.alert_active = self.registry.any_alerting();
            return analysis;
        }

        analysis.face_detected = true;
        self.stats.faces += faces.len() as u64;

        let regions: Vec<FaceRegion> = faces.iter().map(|f| f.region).collect();
        let subjects = self.registry.assign(&regions);

        for (face, subject) in faces.iter().zip(subjects) {
            let left_ear = self.eye_ear(&face.left_eye);
            let right_ear = self.eye_ear(&face.right_eye);
            let ear = mean_ear(left_ear, right_ear);

            let Some(counter) = self.registry.counter_mut(subject) else {
                continue;
            };

            match ear {
                Some(ear) => match counter.update(ear, &self.config) {
                    Some(StateChange::AlertStarted) => {
                        warn!(subject = %subject, ear, counter = counter.count(), "DROWSINESS ALERT");
                        self.stats.alerts_started += 1;
                        metrics::counter!("dms_alerts_started_total").increment(1);
                        analysis.transitions.push(AlertTransition::Started {
                            subject,
                            counter: counter.count(),
                            ear,
                        });
                    }
                    Some(StateChange::AlertStopped) => {
                        info!(subject = %subject, ear, "Drowsiness alert cleared");
                        self.stats.alerts_stopped += 1;
                        analysis.transitions.push(AlertTransition::Stopped { subject });
                    }
                    None => {}
                },
                None => {
                    self.stats.skipped_faces += 1;
                    debug!(subject = %subject, "Both eyes degenerate, counter held");
                }
            }

            debug!(
                frame = frame.sequence,
                subject = %subject,
                ear = ?ear,
                counter = counter.count(),
                "Face evaluated"
            );

            analysis.readings.push(FaceReading {
                subject,
                region: face.region,
                left_ear,
                right_ear,
                ear,
                counter: counter.count(),
                state: counter.state(),
            });
        }

        for stopped in self.registry.retire_stale() {
            self.stats.alerts_stopped += 1;
            analysis.transitions.push(stopped);
        }

        analysis.alert_active = self.registry.any_alerting();
        metrics::gauge!("dms_alert_active").set(if analysis.alert_active { 1.0 } else { 0.0 });
        analysis
    }

    fn eye_ear(&mut self, contour: &EyeContour) -> Option<f32> {
        match contour.aspect_ratio() {
            Ok(ear) => Some(ear),
            Err(e) => {
                self.stats.degenerate_eyes += 1;
                debug!("Skipping eye: {}", e);
                None
            }
        }
    }

    /// Whether any subject is currently alerting
    pub fn is_alerting(&self) -> bool {
        self.registry.any_alerting()
    }

    /// Counter state of one subject
    pub fn subject(&self, id: SubjectId) -> Option<&DrowsinessCounter> {
        self.registry.counter(id)
    }

    pub fn subject_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    /// Reset all subjects (e.g. on operator change)
    pub fn reset_state(&mut self) {
        self.registry.reset();
    }
}
