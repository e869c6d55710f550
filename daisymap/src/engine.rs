//! The contract between the core and a dense descriptor engine.
//!
//! The core never looks inside an engine. It drives it through
//! [DescriptorEngine] in a fixed order: `reset`, `set_image`, `set_parameters`,
//! `initialize_single_descriptor_mode`, `compute_descriptors`,
//! `normalize_descriptors`, then reads `dense_descriptors`.

use crate::error::{DescriptorError, Result};
use crate::image_buffer::FloatImage;
use serde::{Deserialize, Serialize};

/// Geometric configuration of a descriptor's sampling pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometricParams {
    /// Distance from the centre to the outermost sample ring, in pixels.
    pub radius: f64,
    /// Number of sample rings.
    pub radial_q: usize,
    /// Number of samples on each ring.
    pub angular_q: usize,
    /// Number of orientation bins per histogram.
    pub histogram_q: usize,
}

impl Default for GeometricParams {
    fn default() -> Self {
        GeometricParams {
            radius: 15.0,
            radial_q: 3,
            angular_q: 8,
            histogram_q: 8,
        }
    }
}

impl GeometricParams {
    pub fn new(radius: f64, radial_q: usize, angular_q: usize, histogram_q: usize) -> Self {
        GeometricParams {
            radius,
            radial_q,
            angular_q,
            histogram_q,
        }
    }

    /// Checks that the radius is positive and every quantization is at least one.
    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(DescriptorError::InvalidParameters(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        for (name, value) in [
            ("radial_q", self.radial_q),
            ("angular_q", self.angular_q),
            ("histogram_q", self.histogram_q),
        ] {
            if value == 0 {
                return Err(DescriptorError::InvalidParameters(format!(
                    "{name} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// A stateful dense descriptor engine.
///
/// After `compute_descriptors` the engine holds one descriptor of
/// `descriptor_size()` values per pixel, row-major over pixel position.
pub trait DescriptorEngine {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Drops the current image and field.
    fn reset(&mut self);

    fn set_parameters(&mut self, params: &GeometricParams);

    /// Hands the converted image to the engine for one computation.
    fn set_image(&mut self, image: FloatImage);

    fn initialize_single_descriptor_mode(&mut self) -> std::result::Result<(), Self::Error>;

    /// Computes raw, unnormalized descriptors for every pixel.
    fn compute_descriptors(&mut self) -> std::result::Result<(), Self::Error>;

    /// Scales every descriptor to unit L2 norm.
    fn normalize_descriptors(&mut self);

    fn descriptor_size(&self) -> usize;

    /// The computed field, `rows * cols * descriptor_size()` values.
    fn dense_descriptors(&self) -> &[f32];
}
