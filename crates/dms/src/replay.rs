//! Recorded landmark traces
//!
//! A trace is NDJSON, one line per frame that had faces:
//!
//! ```text
//! {"frame": 12, "faces": [{"region": {"x": 210, "y": 95, "width": 220, "height": 220}, "points": [[x, y], ...68]}]}
//! ```
//!
//! Frames missing from the trace have no faces.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::landmarks::{FaceLandmarks, FaceObservation, FaceRegion, LandmarkProvider};
use crate::DmsError;

/// One line of a landmark trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub frame: u32,
    #[serde(default)]
    pub faces: Vec<TraceFace>,
}

/// One recorded face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFace {
    pub region: FaceRegion,
    pub points: Vec<[f32; 2]>,
}

impl TraceFace {
    pub fn from_landmarks(region: FaceRegion, landmarks: &FaceLandmarks) -> Self {
        Self {
            region,
            points: landmarks.points().iter().map(|p| [p.x, p.y]).collect(),
        }
    }
}

/// Write records as NDJSON
pub fn write_trace<W: Write>(mut writer: W, records: &[TraceRecord]) -> Result<(), DmsError> {
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| DmsError::Trace {
            line: record.frame as usize,
            reason: e.to_string(),
        })?;
        writeln!(writer, "{}", line)?;
    }
    Ok(())
}

/// Landmark provider that replays a recorded trace, keyed by frame sequence
#[derive(Debug, Default)]
pub struct ReplayLandmarkProvider {
    frames: HashMap<u32, Vec<(FaceRegion, FaceLandmarks)>>,
    last_frame: Option<u32>,
}

impl ReplayLandmarkProvider {
    /// Load a trace file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DmsError> {
        let path = path.as_ref();
        let provider = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            "Loaded landmark trace {} ({} frames with faces)",
            path.display(),
            provider.frames.len()
        );
        Ok(provider)
    }

    /// Parse NDJSON from any reader. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DmsError> {
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TraceRecord =
                serde_json::from_str(&line).map_err(|e| DmsError::Trace {
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            records.push((index + 1, record));
        }
        Self::build(records)
    }

    pub fn from_records(records: Vec<TraceRecord>) -> Result<Self, DmsError> {
        Self::build(records.into_iter().enumerate().map(|(i, r)| (i + 1, r)).collect())
    }

    fn build(records: Vec<(usize, TraceRecord)>) -> Result<Self, DmsError> {
        let mut provider = Self::default();
        for (line, record) in records {
            let mut faces = Vec::with_capacity(record.faces.len());
            for face in record.faces {
                let points = face.points.into_iter().map(Into::into).collect();
                let landmarks = FaceLandmarks::from_points(points).map_err(|e| DmsError::Trace {
                    line,
                    reason: e.to_string(),
                })?;
                faces.push((face.region, landmarks));
            }
            provider.last_frame = provider.last_frame.max(Some(record.frame));
            provider.frames.entry(record.frame).or_default().extend(faces);
        }
        Ok(provider)
    }

    /// Number of frames the trace spans (highest recorded sequence + 1)
    pub fn frame_count(&self) -> u32 {
        self.last_frame.map_or(0, |f| f.saturating_add(1))
    }
}

impl LandmarkProvider for ReplayLandmarkProvider {
    fn detect_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceRegion>, DmsError> {
        let regions: Vec<FaceRegion> = self
            .frames
            .get(&frame.sequence)
            .map(|faces| faces.iter().map(|(region, _)| *region).collect())
            .unwrap_or_default();
        debug!(frame = frame.sequence, faces = regions.len(), "Replayed detections");
        Ok(regions)
    }

    /// Landmarks of the first recorded face with this exact region
    fn landmarks_for(
        &mut self,
        frame: &VideoFrame,
        region: &FaceRegion,
    ) -> Result<FaceLandmarks, DmsError> {
        self.frames
            .get(&frame.sequence)
            .and_then(|faces| faces.iter().find(|(r, _)| r == region))
            .map(|(_, landmarks)| landmarks.clone())
            .ok_or_else(|| {
                DmsError::Provider(format!(
                    "no landmarks recorded for frame {} region {:?}",
                    frame.sequence, region
                ))
            })
    }

    /// Faces in recorded order. Pairs each region with its own landmarks, so
    /// faces sharing a bounding box keep their own eyes.
    fn observe(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, DmsError> {
        let observations: Vec<FaceObservation> = self
            .frames
            .get(&frame.sequence)
            .map(|faces| {
                faces
                    .iter()
                    .map(|(region, landmarks)| FaceObservation::from_landmarks(*region, landmarks))
                    .collect()
            })
            .unwrap_or_default();
        debug!(frame = frame.sequence, faces = observations.len(), "Replayed observations");
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn region() -> FaceRegion {
        FaceRegion::new(200.0, 100.0, 240.0, 240.0)
    }

    fn record(frame: u32, ear: f32) -> TraceRecord {
        TraceRecord {
            frame,
            faces: vec![TraceFace::from_landmarks(
                region(),
                &FaceLandmarks::synthetic(region(), ear),
            )],
        }
    }

    #[test]
    fn test_trace_written_then_replayed() {
        let mut buffer = Vec::new();
        write_trace(&mut buffer, &[record(0, 0.3), record(3, 0.1)]).unwrap();

        let mut provider = ReplayLandmarkProvider::from_reader(Cursor::new(buffer)).unwrap();
        assert_eq!(provider.frame_count(), 4);

        let frame = VideoFrame::blank(640, 480, 0, 3);
        let faces = provider.observe(&frame).unwrap();
        assert_eq!(faces.len(), 1);
        let ear = faces[0].left_eye.aspect_ratio().unwrap();
        assert!((ear - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_unrecorded_frame_has_no_faces() {
        let mut provider = ReplayLandmarkProvider::from_records(vec![record(5, 0.3)]).unwrap();
        let frame = VideoFrame::blank(64, 48, 0, 2);
        assert!(provider.detect_faces(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut text = String::from("\n");
        text.push_str(&serde_json::to_string(&record(1, 0.3)).unwrap());
        text.push_str("\n\n");
        let provider = ReplayLandmarkProvider::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(provider.frame_count(), 2);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = format!(
            "{}\n{{not json\n",
            serde_json::to_string(&record(0, 0.3)).unwrap()
        );
        let err = ReplayLandmarkProvider::from_reader(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, DmsError::Trace { line: 2, .. }));
    }

    #[test]
    fn test_short_face_rejected() {
        let mut short = record(0, 0.3);
        short.faces[0].points.pop();
        let err = ReplayLandmarkProvider::from_records(vec![short]).unwrap_err();
        assert!(matches!(err, DmsError::Trace { line: 1, .. }));
    }

    #[test]
    fn test_faces_sharing_a_region_keep_their_own_landmarks() {
        let record = TraceRecord {
            frame: 0,
            faces: [0.3, 0.1]
                .iter()
                .map(|&ear| TraceFace::from_landmarks(region(), &FaceLandmarks::synthetic(region(), ear)))
                .collect(),
        };
        let mut provider = ReplayLandmarkProvider::from_records(vec![record]).unwrap();

        let frame = VideoFrame::blank(640, 480, 0, 0);
        let ears: Vec<f32> = provider
            .observe(&frame)
            .unwrap()
            .iter()
            .map(|face| face.left_eye.aspect_ratio().unwrap())
            .collect();

        assert_eq!(ears.len(), 2);
        assert!((ears[0] - 0.3).abs() < 1e-4);
        assert!((ears[1] - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_region_is_provider_error() {
        let mut provider = ReplayLandmarkProvider::from_records(vec![record(0, 0.3)]).unwrap();
        let frame = VideoFrame::blank(64, 48, 0, 0);
        let other = FaceRegion::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            provider.landmarks_for(&frame, &other),
            Err(DmsError::Provider(_))
        ));
    }
}
