//! Facial landmarks and the landmark provider interface
//!
//! Landmarks follow the 68-point iBUG convention used by pretrained shape
//! predictors. The eye contours are fixed index ranges of that layout.

use std::ops::Range;

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::geometry::{EyeContour, Point2};
use crate::DmsError;

/// Points per face in the 68-point layout
pub const FACE_LANDMARK_COUNT: usize = 68;

/// Left eye indices (36..=41)
pub const LEFT_EYE: Range<usize> = 36..42;

/// Right eye indices (42..=47)
pub const RIGHT_EYE: Range<usize> = 42..48;

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceRegion {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// The 68 ordered landmarks of one face
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<Point2>,
}

impl FaceLandmarks {
    pub fn from_points(points: Vec<Point2>) -> Result<Self, DmsError> {
        if points.len() != FACE_LANDMARK_COUNT {
            return Err(DmsError::InvalidLandmarks(points.len()));
        }
        Ok(Self { points })
    }

    /// Build a face whose two eyes have exactly `ear` as aspect ratio.
    ///
    /// Non-eye landmarks collapse onto the region center. Handy for
    /// generating replay traces and fixtures.
    pub fn synthetic(region: FaceRegion, ear: f32) -> Self {
        let mut points = vec![region.center(); FACE_LANDMARK_COUNT];
        let eye_width = region.width * 0.2;
        let eye_y = region.y + region.height * 0.4;

        for (range, eye_x) in [
            (LEFT_EYE, region.x + region.width * 0.3),
            (RIGHT_EYE, region.x + region.width * 0.7),
        ] {
            let contour = eye_outline(Point2::new(eye_x, eye_y), eye_width, eye_width * ear);
            points[range].copy_from_slice(contour.points());
        }

        Self { points }
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn left_eye(&self) -> EyeContour {
        self.contour(LEFT_EYE)
    }

    pub fn right_eye(&self) -> EyeContour {
        self.contour(RIGHT_EYE)
    }

    fn contour(&self, range: Range<usize>) -> EyeContour {
        let p = &self.points[range];
        // Length is fixed by FACE_LANDMARK_COUNT
        EyeContour::new([p[0], p[1], p[2], p[3], p[4], p[5]])
    }
}

fn eye_outline(center: Point2, width: f32, height: f32) -> EyeContour {
    let (cx, cy) = (center.x, center.y);
    EyeContour::new([
        Point2::new(cx - width / 2.0, cy),
        Point2::new(cx - width / 6.0, cy - height / 2.0),
        Point2::new(cx + width / 6.0, cy - height / 2.0),
        Point2::new(cx + width / 2.0, cy),
        Point2::new(cx + width / 6.0, cy + height / 2.0),
        Point2::new(cx - width / 6.0, cy + height / 2.0),
    ])
}

/// One detected face in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub region: FaceRegion,
    pub left_eye: EyeContour,
    pub right_eye: EyeContour,
}

impl FaceObservation {
    pub fn from_landmarks(region: FaceRegion, landmarks: &FaceLandmarks) -> Self {
        Self {
            region,
            left_eye: landmarks.left_eye(),
            right_eye: landmarks.right_eye(),
        }
    }
}

/// Face detection plus landmark extraction.
///
/// Implementations wrap a detector and a 68-point shape predictor, or replay
/// a recording of one.
pub trait LandmarkProvider {
    /// Faces present in the frame. An empty list is a valid observation.
    fn detect_faces(&mut self, frame: &VideoFrame) -> Result<Vec<FaceRegion>, DmsError>;

    /// The 68 landmarks of the face inside `region`
    fn landmarks_for(
        &mut self,
        frame: &VideoFrame,
        region: &FaceRegion,
    ) -> Result<FaceLandmarks, DmsError>;

    /// Detect every face and slice its eye contours
    fn observe(&mut self, frame: &VideoFrame) -> Result<Vec<FaceObservation>, DmsError> {
        let regions = self.detect_faces(frame)?;
        regions
            .into_iter()
            .map(|region| {
                let landmarks = self.landmarks_for(frame, &region)?;
                Ok(FaceObservation::from_landmarks(region, &landmarks))
            })
            .collect()
    }
}
