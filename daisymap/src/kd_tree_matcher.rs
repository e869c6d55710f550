use crate::brute_force_matcher::check_descriptor_rows;
use crate::error::{DescriptorError, Result};
use crate::features::{DescriptorMatcher, Match};
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;
use kd_tree::{KdPoint, KdTree};
use std::marker::PhantomData;
use typenum::Unsigned;

/// A descriptor row tagged with its database index, with a type-level length.
#[derive(Debug, Clone)]
pub struct IndexedDescriptor<N> {
    pub index: usize,
    pub values: Vec<f32>,
    dim: PhantomData<N>,
}

impl<N: Unsigned> IndexedDescriptor<N> {
    pub fn new(index: usize, values: Vec<f32>) -> Self {
        IndexedDescriptor {
            index,
            values,
            dim: PhantomData,
        }
    }
}

impl<N: Unsigned> KdPoint for IndexedDescriptor<N> {
    type Scalar = f32;
    type Dim = N;
    fn at(&self, k: usize) -> f32 {
        self.values[k]
    }
}

/// Matches descriptors through a [KdTree] (from the `kd_tree` crate).
///
/// The descriptor length is fixed at compile time through `N`, e.g.
/// `KdTreeMatcher<typenum::U200>` for DAISY descriptors with the default
/// parameters. Each query is answered with its single nearest neighbour.
pub struct KdTreeMatcher<N: Unsigned> {
    /// Matches farther than this are reported as unmatched.
    pub max_distance: Option<f32>,
    tree: Option<KdTree<IndexedDescriptor<N>>>,
}

/// Matcher for DAISY descriptors computed with the default parameters.
pub type DaisyKdTreeMatcher = KdTreeMatcher<typenum::U200>;

impl<N: Unsigned> Default for KdTreeMatcher<N> {
    fn default() -> Self {
        KdTreeMatcher {
            max_distance: None,
            tree: None,
        }
    }
}

impl<N: Unsigned> KdTreeMatcher<N> {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows_of(&self, descriptors: &Matrix) -> Result<Vec<IndexedDescriptor<N>>> {
        if descriptors.rows() > 0 && descriptors.cols() != N::to_usize() {
            return Err(DescriptorError::ShapeMismatch(format!(
                "k-d tree matcher expects descriptors of length {}, got {}",
                N::to_usize(),
                descriptors.cols()
            )));
        }
        Ok((0..descriptors.rows())
            .filter_map(|i| descriptors.row_f32(i).map(|row| IndexedDescriptor::new(i, row.to_vec())))
            .collect())
    }
}

impl<N: Unsigned> DescriptorMatcher for KdTreeMatcher<N> {
    fn index(&mut self, db_keypoints: &[KeyPoint], db_descriptors: &Matrix) -> Result<()> {
        check_descriptor_rows(db_keypoints, db_descriptors)?;
        let points = self.rows_of(db_descriptors)?;
        self.tree = if points.is_empty() {
            None
        } else {
            Some(KdTree::build_by_ordered_float(points))
        };
        Ok(())
    }

    fn match_descriptors(
        &self,
        query_keypoints: &[KeyPoint],
        query_descriptors: &Matrix,
    ) -> Result<Vec<Match>> {
        check_descriptor_rows(query_keypoints, query_descriptors)?;
        let queries = self.rows_of(query_descriptors)?;

        let mut matches = Vec::with_capacity(queries.len());
        for query in &queries {
            let nearest = self.tree.as_ref().and_then(|tree| tree.nearest(query));
            let record = match nearest {
                Some(found) => {
                    let distance = found.squared_distance.sqrt();
                    if self.max_distance.map_or(true, |max| distance <= max) {
                        Match {
                            query_idx: query.index,
                            train_idx: Some(found.item.index),
                            distance,
                        }
                    } else {
                        Match::unmatched(query.index)
                    }
                }
                None => Match::unmatched(query.index),
            };
            matches.push(record);
        }
        Ok(matches)
    }
}
