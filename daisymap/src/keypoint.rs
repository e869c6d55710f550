use nalgebra::Point2;

/// A detected interest point.
///
/// Only `pt` matters for descriptor lookup; the remaining fields are detector
/// metadata carried through the pipeline untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    /// Sub-pixel position, `x` along columns and `y` along rows.
    pub pt: Point2<f32>,
    /// Diameter of the meaningful neighbourhood.
    pub size: f32,
    /// Orientation in degrees, or `-1.0` when not applicable.
    pub angle: f32,
    /// Detector response (strength).
    pub response: f32,
    /// Pyramid octave the point was detected in.
    pub octave: i32,
    /// Object class, assigned by classifiers.
    pub class_id: Option<i32>,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32) -> Self {
        KeyPoint {
            pt: Point2::new(x, y),
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: None,
        }
    }

    pub fn with_class(mut self, class_id: i32) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Integer pixel coordinates of the point, truncated toward zero.
    ///
    /// No interpolation happens anywhere downstream: a point at `(2.9, 1.2)`
    /// reads the descriptor of pixel `(2, 1)`.
    pub fn pixel(&self) -> (i64, i64) {
        (self.pt.x as i64, self.pt.y as i64)
    }
}
