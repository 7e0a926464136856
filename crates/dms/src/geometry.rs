//! Eye geometry and the Eye Aspect Ratio (EAR)
//!
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//!
//! where p0..p5 run outer corner, upper lid (outer, inner), inner corner,
//! lower lid (inner, outer). Open eyes sit around 0.3, closed eyes near 0.

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Number of points in an eye contour
pub const EYE_CONTOUR_POINTS: usize = 6;

/// 2D image point (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(self, other: Point2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point2 {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point2 {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// Six ordered points outlining one eye. Order is positional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContour([Point2; EYE_CONTOUR_POINTS]);

impl EyeContour {
    pub fn new(points: [Point2; EYE_CONTOUR_POINTS]) -> Self {
        Self(points)
    }

    /// Build from a slice, which must hold exactly six points
    pub fn from_slice(points: &[Point2]) -> Result<Self, DmsError> {
        let points: [Point2; EYE_CONTOUR_POINTS] = points
            .try_into()
            .map_err(|_| DmsError::InvalidContour(points.len()))?;
        Ok(Self(points))
    }

    pub fn points(&self) -> &[Point2; EYE_CONTOUR_POINTS] {
        &self.0
    }

    /// Corner-to-corner width
    pub fn horizontal_span(&self) -> f32 {
        self.0[0].distance(self.0[3])
    }

    /// Eye aspect ratio of this contour
    pub fn aspect_ratio(&self) -> Result<f32, DmsError> {
        eye_aspect_ratio(self)
    }
}

/// Compute the eye aspect ratio.
///
/// Returns [`DmsError::DegenerateGeometry`] when the eye corners coincide
/// (or any coordinate is not finite); the caller decides how to skip it.
pub fn eye_aspect_ratio(contour: &EyeContour) -> Result<f32, DmsError> {
    let p = contour.points();
    if !p.iter().all(|pt| pt.is_finite()) {
        return Err(DmsError::DegenerateGeometry(f32::NAN));
    }

    let horizontal = p[0].distance(p[3]);
    if horizontal < f32::EPSILON {
        return Err(DmsError::DegenerateGeometry(horizontal));
    }

    let a = p[1].distance(p[5]);
    let b = p[2].distance(p[4]);
    Ok((a + b) / (2.0 * horizontal))
}

/// Per-face signal: mean of the two eyes.
///
/// A single usable eye stands in for both; no usable eye yields `None`.
pub fn mean_ear(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn eye(width: f32, height: f32) -> EyeContour {
        let (cx, cy) = (100.0, 50.0);
        EyeContour::new([
            Point2::new(cx - width / 2.0, cy),
            Point2::new(cx - width / 6.0, cy - height / 2.0),
            Point2::new(cx + width / 6.0, cy - height / 2.0),
            Point2::new(cx + width / 2.0, cy),
            Point2::new(cx + width / 6.0, cy + height / 2.0),
            Point2::new(cx - width / 6.0, cy + height / 2.0),
        ])
    }

    fn contour_from(points: [(f32, f32); 6]) -> EyeContour {
        EyeContour::new(points.map(Point2::from))
    }

    #[test]
    fn test_open_and_closed_eye() {
        let open = eye(30.0, 9.0).aspect_ratio().unwrap();
        assert!((open - 0.3).abs() < 1e-5);

        let closed = eye(30.0, 0.0).aspect_ratio().unwrap();
        assert_eq!(closed, 0.0);
    }

    #[test]
    fn test_known_dlib_contour() {
        // Integer landmark positions as a 68-point predictor emits them
        let contour = contour_from([
            (0.0, 0.0),
            (1.0, 2.0),
            (3.0, 2.0),
            (4.0, 0.0),
            (3.0, -2.0),
            (1.0, -2.0),
        ]);
        assert!((contour.aspect_ratio().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_corners() {
        let contour = contour_from([
            (5.0, 5.0),
            (4.0, 3.0),
            (6.0, 3.0),
            (5.0, 5.0),
            (6.0, 7.0),
            (4.0, 7.0),
        ]);
        assert!(matches!(
            eye_aspect_ratio(&contour),
            Err(DmsError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_non_finite_points_rejected() {
        let mut points = *eye(30.0, 9.0).points();
        points[2].y = f32::NAN;
        assert!(EyeContour::new(points).aspect_ratio().is_err());
    }

    #[test]
    fn test_from_slice_length() {
        let points = vec![Point2::default(); 5];
        assert!(matches!(
            EyeContour::from_slice(&points),
            Err(DmsError::InvalidContour(5))
        ));
        assert!(EyeContour::from_slice(&[Point2::default(); 6]).is_ok());
    }

    #[test]
    fn test_mean_ear_fallbacks() {
        assert_eq!(mean_ear(Some(0.2), Some(0.3)), Some(0.25));
        assert_eq!(mean_ear(None, Some(0.3)), Some(0.3));
        assert_eq!(mean_ear(Some(0.1), None), Some(0.1));
        assert_eq!(mean_ear(None, None), None);
    }

    fn contour_strategy() -> impl Strategy<Value = [(f32, f32); 6]> {
        proptest::array::uniform6((-100.0f32..100.0, -100.0f32..100.0))
    }

    proptest! {
        #[test]
        fn prop_ear_non_negative(points in contour_strategy()) {
            let contour = contour_from(points);
            prop_assume!(contour.horizontal_span() > 1e-3);
            prop_assert!(contour.aspect_ratio().unwrap() >= 0.0);
        }

        #[test]
        fn prop_ear_translation_invariant(
            points in contour_strategy(),
            dx in -500.0f32..500.0,
            dy in -500.0f32..500.0
        ) {
            let contour = contour_from(points);
            prop_assume!(contour.horizontal_span() >= 5.0);
            let moved = contour_from(points.map(|(x, y)| (x + dx, y + dy)));

            let a = contour.aspect_ratio().unwrap();
            let b = moved.aspect_ratio().unwrap();
            prop_assert!((a - b).abs() <= 1e-3 * a.max(1.0), "{} vs {}", a, b);
        }

        #[test]
        fn prop_ear_scale_invariant(points in contour_strategy(), k in 0.1f32..10.0) {
            let contour = contour_from(points);
            prop_assume!(contour.horizontal_span() >= 5.0);
            let scaled = contour_from(points.map(|(x, y)| (x * k, y * k)));

            let a = contour.aspect_ratio().unwrap();
            let b = scaled.aspect_ratio().unwrap();
            prop_assert!((a - b).abs() <= 1e-3 * a.max(1.0), "{} vs {}", a, b);
        }
    }
}
