use crate::daisy::DaisyEngine;
use crate::dense_field::DenseField;
use crate::engine::{DescriptorEngine, GeometricParams};
use crate::error::{DescriptorError, Result};
use crate::image_buffer;
use crate::matrix::Matrix;
use log::debug;

/// Owns one descriptor engine together with its geometric parameters.
///
/// The engine is stateful and is driven through a full reset before every
/// computation. The binding is not meant to be shared between threads while a
/// computation runs; give each worker its own binding or serialize access.
pub struct DescriptorEngineBinding<E: DescriptorEngine = DaisyEngine> {
    engine: E,
    params: Option<GeometricParams>,
    /// Image size of the last successful computation.
    field_shape: Option<(usize, usize)>,
    feature_length: usize,
}

impl DescriptorEngineBinding<DaisyEngine> {
    /// A binding around a fresh [DaisyEngine] with validated parameters.
    pub fn daisy(params: GeometricParams) -> Result<Self> {
        let mut binding = DescriptorEngineBinding::new(DaisyEngine::new());
        binding.configure(params)?;
        Ok(binding)
    }
}

impl<E: DescriptorEngine> DescriptorEngineBinding<E> {
    /// Wraps `engine` without parameters; computing fails until [Self::configure] is called.
    pub fn new(engine: E) -> Self {
        DescriptorEngineBinding {
            engine,
            params: None,
            field_shape: None,
            feature_length: 0,
        }
    }

    /// Stores the geometric parameters and forwards them to the engine.
    pub fn configure(&mut self, params: GeometricParams) -> Result<()> {
        params.validate()?;
        self.engine.set_parameters(&params);
        self.params = Some(params);
        Ok(())
    }

    pub fn params(&self) -> Option<&GeometricParams> {
        self.params.as_ref()
    }

    /// Descriptor length negotiated by the last successful computation,
    /// or zero before the first one.
    pub fn feature_length(&self) -> usize {
        self.feature_length
    }

    /// Computes the normalized dense field of `image`.
    ///
    /// Any field returned earlier is invalidated by this call; the borrow
    /// checker enforces that no older view is still alive.
    pub fn compute_dense(&mut self, image: &Matrix) -> Result<DenseField<'_>> {
        let params = self.params.ok_or(DescriptorError::NotConfigured)?;
        let prepared = image_buffer::prepare(image)?;
        let (rows, cols) = (prepared.rows, prepared.cols);

        self.field_shape = None;
        self.engine.reset();
        self.engine.set_image(prepared);
        // The engine may forget its parameters on reset, so they are applied again.
        self.engine.set_parameters(&params);
        self.engine
            .initialize_single_descriptor_mode()
            .map_err(|e| DescriptorError::EngineFailure(Box::new(e)))?;
        self.engine
            .compute_descriptors()
            .map_err(|e| DescriptorError::EngineFailure(Box::new(e)))?;
        self.engine.normalize_descriptors();

        let length = self.engine.descriptor_size();
        DenseField::new(self.engine.dense_descriptors(), rows, cols, length)?;
        self.field_shape = Some((rows, cols));
        self.feature_length = length;
        debug!("computed dense field for {cols}x{rows} image, descriptor length {length}");

        self.field()
            .ok_or_else(|| DescriptorError::EngineFailure("dense field vanished".into()))
    }

    /// The field of the last successful computation, if any.
    ///
    /// Returns `None` after a failed computation, since the engine may hold a
    /// partial result.
    pub fn field(&self) -> Option<DenseField<'_>> {
        let (rows, cols) = self.field_shape?;
        DenseField::new(self.engine.dense_descriptors(), rows, cols, self.feature_length).ok()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_image(rows: usize, cols: usize) -> Matrix {
        let values = (0..rows * cols).map(|i| ((i * 37) % 101) as u8).collect();
        Matrix::new(rows, cols, values).unwrap()
    }

    #[test]
    fn unconfigured_binding_refuses_to_compute() {
        let mut binding = DescriptorEngineBinding::new(DaisyEngine::new());
        assert!(matches!(
            binding.compute_dense(&test_image(4, 4)),
            Err(DescriptorError::NotConfigured)
        ));
        assert_eq!(binding.feature_length(), 0);
    }

    #[test]
    fn feature_length_is_known_after_first_computation() {
        let params = GeometricParams::new(3.0, 1, 4, 4);
        let mut binding = DescriptorEngineBinding::daisy(params).unwrap();
        assert_eq!(binding.feature_length(), 0);

        let field = binding.compute_dense(&test_image(5, 7)).unwrap();
        assert_eq!(field.rows(), 35);
        assert_eq!(field.descriptor_length(), 20);
        for i in 0..field.rows() {
            let norm = field.row(i).iter().map(|v| v * v).sum::<f32>().sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
        }
        assert_eq!(binding.feature_length(), 20);
    }

    #[test]
    fn multi_channel_image_fails_before_engine_runs() {
        let mut binding = DescriptorEngineBinding::daisy(GeometricParams::default()).unwrap();
        let rgb = Matrix::with_channels(4, 4, 3, vec![1u8; 48]).unwrap();
        assert!(matches!(
            binding.compute_dense(&rgb),
            Err(DescriptorError::InvalidChannelCount { channels: 3 })
        ));
        assert!(binding.field().is_none());
        assert!(binding.engine().dense_descriptors().is_empty());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut binding = DescriptorEngineBinding::new(DaisyEngine::new());
        assert!(binding.configure(GeometricParams::new(-1.0, 3, 8, 8)).is_err());
        assert!(binding.params().is_none());
    }
}
