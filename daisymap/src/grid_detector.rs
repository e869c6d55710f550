use crate::error::{DescriptorError, Result};
use crate::features::FeatureDetector;
use crate::keypoint::KeyPoint;
use crate::matrix::Matrix;

/// Places keypoints on a regular grid, for sampling a dense field sparsely.
#[derive(Debug, Clone)]
pub struct GridDetector {
    /// Distance in pixels between neighbouring keypoints.
    pub step: usize,
    /// Pixels skipped along every image edge.
    pub border: usize,
    /// Size assigned to each keypoint.
    pub size: f32,
}

impl Default for GridDetector {
    fn default() -> Self {
        GridDetector {
            step: 8,
            border: 0,
            size: 1.0,
        }
    }
}

impl GridDetector {
    pub fn new(step: usize) -> Self {
        GridDetector {
            step,
            ..Default::default()
        }
    }
}

impl FeatureDetector for GridDetector {
    fn detect(&self, image: &Matrix, mask: Option<&Matrix>) -> Result<Vec<KeyPoint>> {
        if self.step == 0 {
            return Err(DescriptorError::InvalidParameters(
                "grid step must be at least 1".to_string(),
            ));
        }
        let allowed = match mask {
            Some(mask) => {
                if mask.rows() != image.rows() || mask.cols() != image.cols() || mask.channels() != 1 {
                    return Err(DescriptorError::ShapeMismatch(format!(
                        "mask must be {}x{} single-channel, got {}x{}x{}",
                        image.rows(),
                        image.cols(),
                        mask.rows(),
                        mask.cols(),
                        mask.channels()
                    )));
                }
                Some(mask.data().to_f32_vec())
            }
            None => None,
        };

        let mut keypoints = Vec::new();
        let (rows, cols) = (image.rows(), image.cols());
        if rows <= 2 * self.border || cols <= 2 * self.border {
            return Ok(keypoints);
        }
        for y in (self.border..rows - self.border).step_by(self.step) {
            for x in (self.border..cols - self.border).step_by(self.step) {
                if let Some(allowed) = &allowed {
                    if allowed[y * cols + x] == 0.0 {
                        continue;
                    }
                }
                let mut keypoint = KeyPoint::new(x as f32, y as f32);
                keypoint.size = self.size;
                keypoints.push(keypoint);
            }
        }
        Ok(keypoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_covers_image_in_row_major_order() {
        let image = Matrix::new(5, 7, vec![0u8; 35]).unwrap();
        let keypoints = GridDetector::new(3).detect(&image, None).unwrap();
        let positions: Vec<(i64, i64)> = keypoints.iter().map(|k| k.pixel()).collect();
        assert_eq!(positions, vec![(0, 0), (3, 0), (6, 0), (0, 3), (3, 3), (6, 3)]);
    }

    #[test]
    fn mask_restricts_detection() {
        let image = Matrix::new(2, 2, vec![0u8; 4]).unwrap();
        let mask = Matrix::new(2, 2, vec![0u8, 1, 0, 1]).unwrap();
        let keypoints = GridDetector::new(1).detect(&image, Some(&mask)).unwrap();
        let positions: Vec<(i64, i64)> = keypoints.iter().map(|k| k.pixel()).collect();
        assert_eq!(positions, vec![(1, 0), (1, 1)]);

        let wrong = Matrix::new(1, 2, vec![1u8, 1]).unwrap();
        assert!(GridDetector::new(1).detect(&image, Some(&wrong)).is_err());
    }

    #[test]
    fn border_and_step_validation() {
        let image = Matrix::new(4, 4, vec![0u8; 16]).unwrap();
        let detector = GridDetector {
            step: 1,
            border: 2,
            size: 4.0,
        };
        assert!(detector.detect(&image, None).unwrap().is_empty());
        assert!(GridDetector::new(0).detect(&image, None).is_err());
    }
}
