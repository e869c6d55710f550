use crate::error::{DescriptorError, Result};
use crate::features::{DescriptorMatcher, Match};
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;

/// Linear nearest-neighbour matcher over L2 distance.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    /// Matches farther than this are reported as unmatched.
    pub max_distance: Option<f32>,

    /// Lowe's ratio test: accept only if `best < ratio * second_best`.
    /// Typical value: 0.7-0.8.
    pub ratio_threshold: Option<f32>,

    database: Matrix,
}

impl Default for BruteForceMatcher {
    fn default() -> Self {
        BruteForceMatcher {
            max_distance: None,
            ratio_threshold: None,
            database: Matrix::empty(),
        }
    }
}

impl BruteForceMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed descriptors.
    pub fn len(&self) -> usize {
        self.database.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.database.rows() == 0
    }
}

/// Checks that `descriptors` is a single-channel `F32` matrix with one row per keypoint.
pub(crate) fn check_descriptor_rows(keypoints: &[KeyPoint], descriptors: &Matrix) -> Result<()> {
    if descriptors.is_empty() && keypoints.is_empty() {
        return Ok(());
    }
    if descriptors.as_f32_slice().is_none() || descriptors.channels() != 1 {
        return Err(DescriptorError::ShapeMismatch(format!(
            "descriptors must be single-channel F32, got {:?}",
            descriptors.element_type()
        )));
    }
    if descriptors.rows() != keypoints.len() {
        return Err(DescriptorError::ShapeMismatch(format!(
            "{} keypoints but {} descriptor rows",
            keypoints.len(),
            descriptors.rows()
        )));
    }
    Ok(())
}

pub(crate) fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

impl DescriptorMatcher for BruteForceMatcher {
    fn index(&mut self, db_keypoints: &[KeyPoint], db_descriptors: &Matrix) -> Result<()> {
        check_descriptor_rows(db_keypoints, db_descriptors)?;
        self.database = db_descriptors.clone();
        Ok(())
    }

    fn match_descriptors(
        &self,
        query_keypoints: &[KeyPoint],
        query_descriptors: &Matrix,
    ) -> Result<Vec<Match>> {
        check_descriptor_rows(query_keypoints, query_descriptors)?;
        if !self.is_empty() && !query_descriptors.is_empty() && query_descriptors.cols() != self.database.cols() {
            return Err(DescriptorError::ShapeMismatch(format!(
                "query descriptors have length {}, index has {}",
                query_descriptors.cols(),
                self.database.cols()
            )));
        }

        let mut matches = Vec::with_capacity(query_keypoints.len());
        for query_idx in 0..query_keypoints.len() {
            let Some(query) = query_descriptors.row_f32(query_idx) else {
                matches.push(Match::unmatched(query_idx));
                continue;
            };

            let mut best_distance = f32::INFINITY;
            let mut second_best_distance = f32::INFINITY;
            let mut best_train_idx = None;
            for train_idx in 0..self.database.rows() {
                let Some(train) = self.database.row_f32(train_idx) else {
                    continue;
                };
                let distance = l2_distance(query, train);
                if distance < best_distance {
                    second_best_distance = best_distance;
                    best_distance = distance;
                    best_train_idx = Some(train_idx);
                } else if distance < second_best_distance {
                    second_best_distance = distance;
                }
            }

            let within_distance = self.max_distance.map_or(true, |max| best_distance <= max);
            let passes_ratio = self
                .ratio_threshold
                .map_or(true, |ratio| best_distance < ratio * second_best_distance);
            match best_train_idx {
                Some(train_idx) if within_distance && passes_ratio => matches.push(Match {
                    query_idx,
                    train_idx: Some(train_idx),
                    distance: best_distance,
                }),
                _ => matches.push(Match::unmatched(query_idx)),
            }
        }
        Ok(matches)
    }
}
