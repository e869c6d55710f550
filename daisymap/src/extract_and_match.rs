use crate::error::Result;
use crate::features::{DescriptorExtractor, DescriptorMatcher, GenericDescriptorMatch};
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;
use log::debug;

/// A [GenericDescriptorMatch] built from an extractor and a matcher.
///
/// Training keypoints from every `add` call are kept in one growing set; the
/// matcher is re-indexed over the full set after each addition.
pub struct ExtractAndMatch<X, M> {
    extractor: X,
    matcher: M,
    training_points: Vec<KeyPoint>,
    training_descriptors: Matrix,
}

impl<X: DescriptorExtractor, M: DescriptorMatcher> ExtractAndMatch<X, M> {
    pub fn new(extractor: X, matcher: M) -> Self {
        ExtractAndMatch {
            extractor,
            matcher,
            training_points: Vec::new(),
            training_descriptors: Matrix::empty(),
        }
    }

    pub fn training_points(&self) -> &[KeyPoint] {
        &self.training_points
    }

    pub fn training_descriptors(&self) -> &Matrix {
        &self.training_descriptors
    }

    fn describe(&mut self, image: &Matrix, points: &[KeyPoint]) -> Result<Matrix> {
        let mut descriptors = Matrix::empty();
        self.extractor.compute(image, points, &mut descriptors)?;
        Ok(descriptors)
    }
}

impl<X: DescriptorExtractor, M: DescriptorMatcher> GenericDescriptorMatch for ExtractAndMatch<X, M> {
    fn add(&mut self, image: &Matrix, points: &[KeyPoint]) -> Result<()> {
        let descriptors = self.describe(image, points)?;
        let mut stacked = self.training_descriptors.clone();
        stacked.push_rows_f32(&descriptors)?;
        let mut training_points = self.training_points.clone();
        training_points.extend_from_slice(points);

        self.matcher.index(&training_points, &stacked)?;
        self.training_points = training_points;
        self.training_descriptors = stacked;
        debug!("training set holds {} keypoints", self.training_points.len());
        Ok(())
    }

    fn classify(&mut self, image: &Matrix, points: &mut [KeyPoint]) -> Result<()> {
        let indices = self.match_points(image, points)?;
        for (point, index) in points.iter_mut().zip(indices) {
            point.class_id = index.and_then(|i| self.training_points[i].class_id);
        }
        Ok(())
    }

    fn match_points(&mut self, image: &Matrix, points: &[KeyPoint]) -> Result<Vec<Option<usize>>> {
        let descriptors = self.describe(image, points)?;
        let matches = self.matcher.match_descriptors(points, &descriptors)?;
        Ok(matches.into_iter().map(|m| m.train_idx).collect())
    }
}
