//! Capability contracts for a detect → extract → match pipeline.
//!
//! Methods take `&mut self` where an implementation may cache results between
//! calls, as the dense extractors do.

use crate::error::Result;
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;

/// Finds interest points in an image.
pub trait FeatureDetector {
    /// Detects keypoints in `image`. When `mask` is given, only pixels where it
    /// is non-zero may hold a keypoint.
    fn detect(&self, image: &Matrix, mask: Option<&Matrix>) -> Result<Vec<KeyPoint>>;
}

/// Computes descriptors for an image.
pub trait DescriptorExtractor {
    /// Computes one descriptor row per keypoint into `descriptors`.
    fn compute(
        &mut self,
        image: &Matrix,
        keypoints: &[KeyPoint],
        descriptors: &mut Matrix,
    ) -> Result<()>;

    /// Computes one descriptor per pixel; row `y * cols + x` describes `(x, y)`.
    ///
    /// Extractors without a dense mode leave `descriptors` untouched.
    fn compute_dense(&mut self, _image: &Matrix, _descriptors: &mut Matrix) -> Result<()> {
        Ok(())
    }
}

/// One match record per query descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index of the query descriptor.
    pub query_idx: usize,
    /// Index into the indexed database, or `None` when no acceptable
    /// correspondence exists.
    pub train_idx: Option<usize>,
    /// Euclidean distance to the match, `f32::INFINITY` when unmatched.
    pub distance: f32,
}

impl Match {
    pub fn unmatched(query_idx: usize) -> Self {
        Match {
            query_idx,
            train_idx: None,
            distance: f32::INFINITY,
        }
    }
}

/// Matches query descriptors against an indexed database.
pub trait DescriptorMatcher {
    /// Builds or replaces the searchable index. `db_descriptors` holds one
    /// `F32` row per keypoint.
    fn index(&mut self, db_keypoints: &[KeyPoint], db_descriptors: &Matrix) -> Result<()>;

    /// Returns exactly one [Match] per query row, in query order.
    fn match_descriptors(
        &self,
        query_keypoints: &[KeyPoint],
        query_descriptors: &Matrix,
    ) -> Result<Vec<Match>>;
}

/// Combined extraction and matching for pipelines that grow the training set
/// while querying it.
pub trait GenericDescriptorMatch {
    /// Adds keypoints of one image to the training set.
    fn add(&mut self, image: &Matrix, points: &[KeyPoint]) -> Result<()>;

    /// Assigns `class_id` to test keypoints.
    fn classify(&mut self, _image: &Matrix, _points: &mut [KeyPoint]) -> Result<()> {
        Ok(())
    }

    /// Returns the matching training point index for each test keypoint.
    fn match_points(&mut self, _image: &Matrix, _points: &[KeyPoint]) -> Result<Vec<Option<usize>>> {
        Ok(Vec::new())
    }

    /// Searches a test image for training keypoints, returning the found
    /// points with the index of the training point each corresponds to.
    fn search(&mut self, _test_image: &Matrix) -> Result<Vec<(KeyPoint, usize)>> {
        Ok(Vec::new())
    }
}
