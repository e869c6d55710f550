use approx::assert_relative_eq;
use daisymap::features::DescriptorExtractor;
use daisymap::image_buffer::FloatImage;
use daisymap::{
    DaisyDescriptorExtractor, DenseDescriptorExtractor, DescriptorEngine, DescriptorError,
    FieldState, GeometricParams, KeyPoint, Matrix,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// An engine with descriptors of length 3 whose rows encode the pixel index.
#[derive(Default)]
struct StubEngine {
    image: Option<FloatImage>,
    params: Option<GeometricParams>,
    descriptors: Vec<f32>,
    resets: usize,
    normalized: bool,
    computations: usize,
    /// `compute_descriptors` fails from this call onwards (1-based).
    fail_from: Option<usize>,
}

#[derive(Debug)]
struct StubError;

impl fmt::Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub engine failed to compute")
    }
}

impl std::error::Error for StubError {}

impl DescriptorEngine for StubEngine {
    type Error = StubError;

    fn reset(&mut self) {
        self.image = None;
        self.params = None;
        self.descriptors.clear();
        self.normalized = false;
        self.resets += 1;
    }

    fn set_parameters(&mut self, params: &GeometricParams) {
        self.params = Some(*params);
    }

    fn set_image(&mut self, image: FloatImage) {
        self.image = Some(image);
    }

    fn initialize_single_descriptor_mode(&mut self) -> Result<(), StubError> {
        match (&self.image, &self.params) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(StubError),
        }
    }

    fn compute_descriptors(&mut self) -> Result<(), StubError> {
        self.computations += 1;
        if self.fail_from.is_some_and(|n| self.computations >= n) {
            // Leave a partial result behind, as a real engine might.
            self.descriptors = vec![0.5; 3];
            return Err(StubError);
        }
        let image = self.image.as_ref().ok_or(StubError)?;
        self.descriptors = (0..image.pixel_count())
            .flat_map(|p| [p as f32 + 1.0, 1.0, (p % 3) as f32])
            .collect();
        Ok(())
    }

    fn normalize_descriptors(&mut self) {
        for row in self.descriptors.chunks_exact_mut(3) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            row.iter_mut().for_each(|v| *v /= norm);
        }
        self.normalized = true;
    }

    fn descriptor_size(&self) -> usize {
        3
    }

    fn dense_descriptors(&self) -> &[f32] {
        &self.descriptors
    }
}

fn stub_extractor() -> DenseDescriptorExtractor<StubEngine> {
    let mut extractor = DenseDescriptorExtractor::with_engine(StubEngine::default());
    extractor.configure(GeometricParams::default()).unwrap();
    extractor
}

fn random_image(rows: usize, cols: usize, seed: u64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..rows * cols).map(|_| rng.gen_range(0..=255u8)).collect();
    Matrix::new(rows, cols, values).unwrap()
}

#[test]
fn four_by_four_example_reads_row_six() {
    let mut extractor = stub_extractor();
    let image = random_image(4, 4, 1);
    let query = Matrix::new(1, 2, vec![2i32, 1]).unwrap();
    let mut out = Matrix::empty();
    extractor.compute_query_points(&image, &query, &mut out).unwrap();

    assert_eq!(extractor.feature_length(), 3);
    let field = extractor.last_field().unwrap();
    assert_eq!(out.row_f32(0).unwrap(), field.row(1 * 4 + 2));
    let expected = [7.0f32, 1.0, 0.0];
    let norm = (49.0f32 + 1.0).sqrt();
    for (value, raw) in out.row_f32(0).unwrap().iter().zip(expected) {
        assert_relative_eq!(*value, raw / norm, epsilon = 1e-6);
    }
}

#[test]
fn parameters_are_reapplied_after_every_reset() {
    let mut extractor = stub_extractor();
    extractor.dense_field(&random_image(3, 3, 2)).unwrap();
    extractor.dense_field(&random_image(2, 5, 3)).unwrap();
    let engine = extractor.binding().engine();
    assert_eq!(engine.resets, 2);
    assert!(engine.normalized);
    assert_eq!(engine.params, Some(GeometricParams::default()));
}

#[test]
fn dense_field_shape_and_norm_with_daisy_engine() {
    let params = GeometricParams::new(5.0, 2, 6, 4);
    let mut extractor = DaisyDescriptorExtractor::new(params).unwrap();
    let image = random_image(9, 13, 4);
    let mut dense = Matrix::empty();
    extractor.compute_dense(&image, &mut dense).unwrap();

    assert_eq!(extractor.feature_length(), (1 + 2 * 6) * 4);
    assert_eq!(dense.rows(), 9 * 13);
    assert_eq!(dense.cols(), extractor.feature_length());
    for i in 0..dense.rows() {
        let norm = dense.row_f32(i).unwrap().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
    }
}

#[test]
fn keypoint_and_query_resolution_agree() {
    let mut extractor = DaisyDescriptorExtractor::new(GeometricParams::new(4.0, 2, 4, 4)).unwrap();
    let image = random_image(10, 8, 5);
    let coords = [(0, 0), (7, 9), (3, 4), (5, 1)];

    let keypoints: Vec<KeyPoint> = coords
        .iter()
        .map(|&(x, y)| KeyPoint::new(x as f32 + 0.75, y as f32 + 0.25))
        .collect();
    let mut by_keypoint = Matrix::empty();
    extractor.compute(&image, &keypoints, &mut by_keypoint).unwrap();

    let ints: Vec<i32> = coords.iter().flat_map(|&(x, y)| [x, y]).collect();
    let mut by_int_query = Matrix::empty();
    extractor
        .compute_query_points(&image, &Matrix::new(4, 2, ints).unwrap(), &mut by_int_query)
        .unwrap();

    let floats: Vec<f32> = coords.iter().flat_map(|&(x, y)| [x as f32, y as f32]).collect();
    let mut by_float_query = Matrix::empty();
    extractor
        .compute_query_points(&image, &Matrix::new(4, 2, floats).unwrap(), &mut by_float_query)
        .unwrap();

    assert_eq!(by_keypoint, by_int_query);
    assert_eq!(by_keypoint, by_float_query);

    // Rows come back in input order.
    let field = extractor.last_field().unwrap();
    for (i, &(x, y)) in coords.iter().enumerate() {
        assert_eq!(by_keypoint.row_f32(i).unwrap(), field.descriptor_at(x as usize, y as usize).unwrap());
    }
}

#[test]
fn preallocated_output_is_filled_in_place() {
    let mut extractor = stub_extractor();
    let image = random_image(5, 5, 6);
    let keypoints = [KeyPoint::new(4.0, 4.0), KeyPoint::new(0.0, 2.0)];

    let mut out = Matrix::zeros_f32(2, 3).unwrap();
    let ptr = out.as_f32_slice().unwrap().as_ptr();
    extractor.compute(&image, &keypoints, &mut out).unwrap();
    assert_eq!(out.as_f32_slice().unwrap().as_ptr(), ptr);

    let mut fresh = Matrix::empty();
    extractor.compute(&image, &keypoints, &mut fresh).unwrap();
    assert_eq!((fresh.rows(), fresh.cols()), (2, 3));
    assert_eq!(fresh, out);
}

#[test]
fn output_shape_and_type_violations() {
    let mut extractor = stub_extractor();
    let image = random_image(5, 5, 7);
    let keypoints = [KeyPoint::new(1.0, 1.0)];

    let mut wrong_cols = Matrix::zeros_f32(1, 4).unwrap();
    assert!(matches!(
        extractor.compute(&image, &keypoints, &mut wrong_cols),
        Err(DescriptorError::ShapeMismatch(_))
    ));
    assert!(wrong_cols.as_f32_slice().unwrap().iter().all(|&v| v == 0.0));

    let mut wrong_type = Matrix::new(1, 3, vec![0.0f64; 3]).unwrap();
    assert!(matches!(
        extractor.compute(&image, &keypoints, &mut wrong_type),
        Err(DescriptorError::ShapeMismatch(_))
    ));
}

#[test]
fn out_of_range_coordinates_fail() {
    let mut extractor = stub_extractor();
    let image = random_image(3, 4, 8);
    let mut out = Matrix::empty();

    let x_too_large = Matrix::new(1, 2, vec![4i32, 0]).unwrap();
    assert!(matches!(
        extractor.compute_query_points(&image, &x_too_large, &mut out),
        Err(DescriptorError::IndexOutOfRange { .. })
    ));

    let y_too_large = [KeyPoint::new(0.0, 3.0)];
    assert!(matches!(
        extractor.compute(&image, &y_too_large, &mut Matrix::empty()),
        Err(DescriptorError::IndexOutOfRange { .. })
    ));
}

#[test]
fn recomputing_replaces_the_field() {
    let mut extractor = stub_extractor();
    let first = extractor.dense_field(&random_image(4, 4, 9)).unwrap().to_matrix().unwrap();
    assert_eq!(first.rows(), 16);

    let second = extractor.dense_field(&random_image(2, 3, 10)).unwrap();
    assert_eq!(second.rows(), 6);
    assert_eq!(extractor.state(), FieldState::Computed { rows: 2, cols: 3 });
    // The deep copy is unaffected by the second computation.
    assert_eq!(first.rows(), 16);
    assert_eq!(first.row_f32(15).unwrap().len(), 3);
}

#[test]
fn engine_failure_invalidates_the_previous_field() {
    let engine = StubEngine {
        fail_from: Some(2),
        ..StubEngine::default()
    };
    let mut extractor = DenseDescriptorExtractor::with_engine(engine);
    extractor.configure(GeometricParams::default()).unwrap();

    extractor.dense_field(&random_image(3, 3, 11)).unwrap();
    assert_eq!(extractor.state(), FieldState::Computed { rows: 3, cols: 3 });

    let err = extractor.dense_field(&random_image(3, 3, 12)).unwrap_err();
    assert!(matches!(err, DescriptorError::EngineFailure(_)));
    assert_eq!(extractor.state(), FieldState::Stale);
    assert!(matches!(extractor.last_field(), Err(DescriptorError::StaleField)));
    assert!(extractor.binding().field().is_none());

    let mut out = Matrix::empty();
    assert!(matches!(
        extractor.compute(&random_image(3, 3, 13), &[KeyPoint::new(1.0, 1.0)], &mut out),
        Err(DescriptorError::EngineFailure(_))
    ));
    assert!(out.is_empty());
}

#[test]
fn multi_channel_image_never_reaches_the_engine() {
    let mut extractor = stub_extractor();
    let rgb = Matrix::with_channels(4, 4, 3, vec![10u8; 48]).unwrap();
    assert!(matches!(
        extractor.compute_dense(&rgb, &mut Matrix::empty()),
        Err(DescriptorError::InvalidChannelCount { channels: 3 })
    ));
    assert_eq!(extractor.binding().engine().resets, 0);
}
