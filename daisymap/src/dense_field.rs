use crate::error::{DescriptorError, Result};
use crate::matrix::Matrix;

/// A borrowed view of a dense descriptor field.
///
/// The field holds one descriptor per pixel of the image it was computed for:
/// row `y * image_cols + x` describes pixel `(x, y)`. The view borrows the
/// engine's memory, so it cannot outlive the next computation; use
/// [DenseField::to_matrix] to keep a copy.
#[derive(Debug, Clone, Copy)]
pub struct DenseField<'a> {
    descriptors: &'a [f32],
    image_rows: usize,
    image_cols: usize,
    descriptor_length: usize,
}

impl<'a> DenseField<'a> {
    /// Wraps engine memory. `descriptors` must hold exactly
    /// `image_rows * image_cols * descriptor_length` values.
    pub fn new(
        descriptors: &'a [f32],
        image_rows: usize,
        image_cols: usize,
        descriptor_length: usize,
    ) -> Result<Self> {
        let expected = image_rows * image_cols * descriptor_length;
        if descriptors.len() != expected {
            return Err(DescriptorError::EngineFailure(
                format!(
                    "engine produced {} values, expected {image_rows}x{image_cols} pixels of length {descriptor_length}",
                    descriptors.len()
                )
                .into(),
            ));
        }
        Ok(DenseField {
            descriptors,
            image_rows,
            image_cols,
            descriptor_length,
        })
    }

    /// Number of descriptor rows, equal to the image's pixel count.
    pub fn rows(&self) -> usize {
        self.image_rows * self.image_cols
    }

    pub fn descriptor_length(&self) -> usize {
        self.descriptor_length
    }

    pub fn image_rows(&self) -> usize {
        self.image_rows
    }

    pub fn image_cols(&self) -> usize {
        self.image_cols
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.descriptors
    }

    /// Returns descriptor row `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.rows()`.
    pub fn row(&self, index: usize) -> &'a [f32] {
        let start = index * self.descriptor_length;
        &self.descriptors[start..start + self.descriptor_length]
    }

    /// Returns the descriptor of pixel `(x, y)`, or `None` outside the image.
    pub fn descriptor_at(&self, x: usize, y: usize) -> Option<&'a [f32]> {
        if x >= self.image_cols || y >= self.image_rows {
            None
        } else {
            Some(self.row(y * self.image_cols + x))
        }
    }

    /// Deep-copies the field into an owned `(rows*cols) x length` matrix.
    pub fn to_matrix(&self) -> Result<Matrix> {
        Matrix::new(self.rows(), self.descriptor_length, self.descriptors.to_vec())
    }

    /// Copies the field into `out`.
    ///
    /// An empty `out` is replaced by a freshly allocated matrix. A non-empty
    /// `out` is overwritten in place and must already be a single-channel
    /// `F32` matrix of the field's shape.
    pub fn copy_to(&self, out: &mut Matrix) -> Result<()> {
        if out.is_empty() {
            *out = self.to_matrix()?;
            return Ok(());
        }
        check_f32_output(out, self.rows(), Some(self.descriptor_length))?;
        if let Some(values) = out.as_f32_mut() {
            values.copy_from_slice(self.descriptors);
        }
        Ok(())
    }
}

/// Validates a preallocated output buffer.
///
/// `cols` is `None` when the descriptor length is not known yet; the column
/// count is then checked later, still before anything is written.
pub(crate) fn check_f32_output(out: &Matrix, rows: usize, cols: Option<usize>) -> Result<()> {
    let type_ok = out.as_f32_slice().is_some() && out.channels() == 1;
    let rows_ok = out.rows() == rows;
    let cols_ok = cols.map_or(true, |c| out.cols() == c);
    if type_ok && rows_ok && cols_ok {
        return Ok(());
    }
    let expected_cols = cols.map_or_else(|| "L".to_string(), |c| c.to_string());
    Err(DescriptorError::ShapeMismatch(format!(
        "output must be {rows}x{expected_cols} single-channel F32, got {}x{}x{} {:?}",
        out.rows(),
        out.cols(),
        out.channels(),
        out.element_type()
    )))
}
