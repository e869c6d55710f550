use crate::dense_field::{check_f32_output, DenseField};
use crate::error::{DescriptorError, Result};
use crate::keypoint::KeyPoint;
use crate::matrix::{ElementType, Matrix, MatrixData};
use log::debug;

/// Resolves sparse descriptors by copying rows out of a dense field.
///
/// Both entry points are pure row lookups; no interpolation is performed.
/// All query positions are validated before the first row is written.
pub struct SparseResolver<'a> {
    field: DenseField<'a>,
}

impl<'a> SparseResolver<'a> {
    pub fn new(field: DenseField<'a>) -> Self {
        SparseResolver { field }
    }

    /// Copies one descriptor per keypoint into `descriptors`, in keypoint order.
    ///
    /// Keypoint positions are truncated to integer pixels. An empty
    /// `descriptors` is allocated as `N x L`; a preallocated one must already
    /// have that shape and hold `F32` values.
    pub fn resolve_keypoints(&self, keypoints: &[KeyPoint], descriptors: &mut Matrix) -> Result<()> {
        let indices = keypoints
            .iter()
            .enumerate()
            .map(|(i, kp)| self.pixel_row(i, kp.pt.x as f64, kp.pt.y as f64))
            .collect::<Result<Vec<usize>>>()?;
        self.copy_rows(&indices, descriptors)?;
        debug!("resolved {} keypoint descriptors", indices.len());
        Ok(())
    }

    /// Copies one descriptor per row of the `N x 2` query matrix (`x`, `y`)
    /// into `descriptors`.
    ///
    /// Query points must be `F32` or `I32`. Float coordinates are truncated
    /// toward zero, exactly like keypoint positions.
    pub fn resolve_query_points(&self, query_points: &Matrix, descriptors: &mut Matrix) -> Result<()> {
        check_query_points(query_points)?;
        let cols = self.field.image_cols();
        let indices = match query_points.data() {
            MatrixData::F32(values) => values
                .chunks_exact(2)
                .enumerate()
                .map(|(i, p)| self.pixel_row(i, p[0] as f64, p[1] as f64))
                .collect::<Result<Vec<usize>>>()?,
            MatrixData::I32(values) => {
                self.check_integer_bounds(values)?;
                // In range, so the row-major index is formed in one pass.
                values
                    .chunks_exact(2)
                    .map(|p| p[0] as usize + p[1] as usize * cols)
                    .collect()
            }
            other => return Err(DescriptorError::UnsupportedQueryType(other.element_type())),
        };
        self.copy_rows(&indices, descriptors)?;
        debug!("resolved {} query point descriptors", indices.len());
        Ok(())
    }

    fn check_integer_bounds(&self, values: &[i32]) -> Result<()> {
        for (i, p) in values.chunks_exact(2).enumerate() {
            self.pixel_row(i, p[0] as f64, p[1] as f64)?;
        }
        Ok(())
    }

    /// Row index of the pixel containing `(x, y)`.
    fn pixel_row(&self, query: usize, x: f64, y: f64) -> Result<usize> {
        let (rows, cols) = (self.field.image_rows(), self.field.image_cols());
        let out_of_range = || DescriptorError::IndexOutOfRange {
            query,
            x,
            y,
            cols,
            rows,
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(out_of_range());
        }
        let (px, py) = (x.trunc(), y.trunc());
        if px < 0.0 || py < 0.0 || px >= cols as f64 || py >= rows as f64 {
            return Err(out_of_range());
        }
        Ok(py as usize * cols + px as usize)
    }

    fn copy_rows(&self, indices: &[usize], descriptors: &mut Matrix) -> Result<()> {
        let length = self.field.descriptor_length();
        if descriptors.is_empty() {
            *descriptors = Matrix::zeros_f32(indices.len(), length)?;
        } else {
            check_f32_output(descriptors, indices.len(), Some(length))?;
        }
        if let Some(out) = descriptors.as_f32_mut() {
            for (dst, &index) in out.chunks_exact_mut(length.max(1)).zip(indices) {
                dst.copy_from_slice(self.field.row(index));
            }
        }
        Ok(())
    }
}

/// Checks that a query matrix is `N x 2`, single channel, `F32` or `I32`.
pub fn check_query_points(query_points: &Matrix) -> Result<()> {
    match query_points.element_type() {
        ElementType::F32 | ElementType::I32 => {}
        other => return Err(DescriptorError::UnsupportedQueryType(other)),
    }
    if query_points.is_empty() {
        return Ok(());
    }
    if query_points.cols() != 2 || query_points.channels() != 1 {
        return Err(DescriptorError::ShapeMismatch(format!(
            "query points must be Nx2 single-channel, got {}x{}x{}",
            query_points.rows(),
            query_points.cols(),
            query_points.channels()
        )));
    }
    Ok(())
}
