use crate::error::{DescriptorError, Result};
use crate::matrix::Matrix;

/// A single-channel image converted to `f32`, in the layout the descriptor
/// engine consumes.
///
/// Pixel `(x, y)` lives at index `y * cols + x`. Values are cast from the
/// source type without rescaling, so an 8-bit image keeps its `0..=255` range.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    /// Pixel data stored row-major in a 1D `Vec<f32>`.
    pub data: Vec<f32>,
    /// The number of pixel rows (image height).
    pub rows: usize,
    /// The number of pixel columns (image width).
    pub cols: usize,
}

impl FloatImage {
    /// Returns the value at `(x, y)`, clamping the coordinates to the image.
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.cols as isize - 1) as usize;
        let y = y.clamp(0, self.rows as isize - 1) as usize;
        self.data[y * self.cols + x]
    }

    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Converts a single-channel image of any element type into a freshly
/// allocated [FloatImage]. The caller's image is left untouched.
///
/// # Errors
/// - [DescriptorError::InvalidChannelCount] if the image has more than one channel.
/// - [DescriptorError::EmptyImage] if the image has no rows or no columns.
pub fn prepare(image: &Matrix) -> Result<FloatImage> {
    if image.channels() != 1 {
        return Err(DescriptorError::InvalidChannelCount {
            channels: image.channels(),
        });
    }
    if image.rows() == 0 || image.cols() == 0 {
        return Err(DescriptorError::EmptyImage {
            rows: image.rows(),
            cols: image.cols(),
        });
    }
    Ok(FloatImage {
        data: image.data().to_f32_vec(),
        rows: image.rows(),
        cols: image.cols(),
    })
}
