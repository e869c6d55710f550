use crate::binding::DescriptorEngineBinding;
use crate::daisy::DaisyEngine;
use crate::dense_field::{check_f32_output, DenseField};
use crate::engine::{DescriptorEngine, GeometricParams};
use crate::error::{DescriptorError, Result};
use crate::features::DescriptorExtractor;
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;
use crate::sparse::{check_query_points, SparseResolver};

/// Lifecycle of the dense field held by an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    /// No geometric parameters yet.
    Unconfigured,
    /// Parameters set, nothing computed.
    Configured,
    /// A valid field for an image of `rows x cols`.
    Computed { rows: usize, cols: usize },
    /// A computation started or failed; the previous field is gone.
    Stale,
}

/// Extracts dense descriptor fields and resolves sparse descriptors from them.
///
/// One extractor owns one engine and is reused across images. Each call that
/// takes an image recomputes the dense field for it, replacing the previous one.
pub struct DenseDescriptorExtractor<E: DescriptorEngine = DaisyEngine> {
    binding: DescriptorEngineBinding<E>,
    state: FieldState,
}

/// The extractor over the bundled [DaisyEngine].
pub type DaisyDescriptorExtractor = DenseDescriptorExtractor<DaisyEngine>;

impl DenseDescriptorExtractor<DaisyEngine> {
    /// Creates a DAISY extractor, e.g. with `GeometricParams::default()` (15, 3, 8, 8).
    pub fn new(params: GeometricParams) -> Result<Self> {
        let mut extractor = Self::with_engine(DaisyEngine::new());
        extractor.configure(params)?;
        Ok(extractor)
    }
}

impl<E: DescriptorEngine> DenseDescriptorExtractor<E> {
    /// Wraps an unconfigured engine.
    pub fn with_engine(engine: E) -> Self {
        DenseDescriptorExtractor {
            binding: DescriptorEngineBinding::new(engine),
            state: FieldState::Unconfigured,
        }
    }

    /// Sets new geometric parameters. Any computed field becomes stale.
    pub fn configure(&mut self, params: GeometricParams) -> Result<()> {
        self.binding.configure(params)?;
        self.state = match self.state {
            FieldState::Unconfigured => FieldState::Configured,
            FieldState::Configured => FieldState::Configured,
            FieldState::Computed { .. } | FieldState::Stale => FieldState::Stale,
        };
        Ok(())
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Descriptor length, or zero until the first dense computation succeeds.
    pub fn feature_length(&self) -> usize {
        self.binding.feature_length()
    }

    pub fn binding(&self) -> &DescriptorEngineBinding<E> {
        &self.binding
    }

    /// Computes the dense field of `image` and returns a borrowed view of it.
    pub fn dense_field(&mut self, image: &Matrix) -> Result<DenseField<'_>> {
        if self.state == FieldState::Unconfigured {
            return Err(DescriptorError::NotConfigured);
        }
        if let FieldState::Computed { .. } = self.state {
            self.state = FieldState::Stale;
        }
        let field = self.binding.compute_dense(image)?;
        self.state = FieldState::Computed {
            rows: field.image_rows(),
            cols: field.image_cols(),
        };
        Ok(field)
    }

    /// The field of the most recent successful computation.
    pub fn last_field(&self) -> Result<DenseField<'_>> {
        match self.state {
            FieldState::Unconfigured => Err(DescriptorError::NotConfigured),
            FieldState::Computed { .. } => self.binding.field().ok_or(DescriptorError::StaleField),
            FieldState::Configured | FieldState::Stale => Err(DescriptorError::StaleField),
        }
    }

    /// Computes the dense field of `image` into `descriptors`.
    ///
    /// An empty `descriptors` receives a new `(rows*cols) x L` matrix. A
    /// preallocated one is filled in place and must have that shape and hold
    /// `F32` values; its row count and type are checked before computing.
    pub fn compute_dense_into(&mut self, image: &Matrix, descriptors: &mut Matrix) -> Result<()> {
        if !descriptors.is_empty() {
            check_f32_output(descriptors, image.rows() * image.cols(), None)?;
        }
        let field = self.dense_field(image)?;
        field.copy_to(descriptors)
    }

    /// Computes one descriptor per keypoint, in keypoint order.
    pub fn compute_keypoints(
        &mut self,
        image: &Matrix,
        keypoints: &[KeyPoint],
        descriptors: &mut Matrix,
    ) -> Result<()> {
        if !descriptors.is_empty() {
            check_f32_output(descriptors, keypoints.len(), None)?;
        }
        let field = self.dense_field(image)?;
        SparseResolver::new(field).resolve_keypoints(keypoints, descriptors)
    }

    /// Computes one descriptor per row of an `N x 2` (`x`, `y`) query matrix.
    ///
    /// The output length comes from [Self::feature_length], which the dense
    /// computation performed here establishes.
    pub fn compute_query_points(
        &mut self,
        image: &Matrix,
        query_points: &Matrix,
        descriptors: &mut Matrix,
    ) -> Result<()> {
        check_query_points(query_points)?;
        if !descriptors.is_empty() {
            check_f32_output(descriptors, query_points.rows(), None)?;
        }
        self.dense_field(image)?;
        if descriptors.is_empty() {
            *descriptors = Matrix::zeros_f32(query_points.rows(), self.feature_length())?;
        }
        let field = self.last_field()?;
        SparseResolver::new(field).resolve_query_points(query_points, descriptors)
    }
}

impl<E: DescriptorEngine> DescriptorExtractor for DenseDescriptorExtractor<E> {
    fn compute(
        &mut self,
        image: &Matrix,
        keypoints: &[KeyPoint],
        descriptors: &mut Matrix,
    ) -> Result<()> {
        self.compute_keypoints(image, keypoints, descriptors)
    }

    fn compute_dense(&mut self, image: &Matrix, descriptors: &mut Matrix) -> Result<()> {
        self.compute_dense_into(image, descriptors)
    }
}
