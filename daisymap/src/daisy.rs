use crate::engine::{DescriptorEngine, GeometricParams};
use crate::image_buffer::FloatImage;
use log::{trace, warn};
use std::f32::consts::PI;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaisyError {
    #[error("no image was supplied before computing")]
    NoImage,

    #[error("sampling grid is not initialized")]
    NotInitialized,

    #[error("illegal parameter: {0}")]
    InvalidParameters(String),
}

/// A DAISY-style dense descriptor engine.
///
/// For every pixel the descriptor concatenates orientation histograms taken
/// at a centre sample and at `angular_q` samples on each of `radial_q` rings.
/// Histogram bins are rectified directional gradients, smoothed with a box
/// filter whose size grows with the ring radius.
///
/// Descriptor length is `(1 + radial_q * angular_q) * histogram_q`, so the
/// default parameters give 200 values per pixel.
pub struct DaisyEngine {
    params: GeometricParams,
    image: Option<FloatImage>,
    /// Smoothed orientation layers, indexed `[level * histogram_q + bin]`.
    layers: Vec<Vec<f32>>,
    /// Sample offsets `(dx, dy, level)` after the centre sample.
    grid: Vec<(isize, isize, usize)>,
    descriptors: Vec<f32>,
}

impl Default for DaisyEngine {
    fn default() -> Self {
        DaisyEngine::new()
    }
}

impl DaisyEngine {
    pub fn new() -> Self {
        DaisyEngine {
            params: GeometricParams::default(),
            image: None,
            layers: Vec::new(),
            grid: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Box filter radius used for smoothing level `level`.
    fn level_blur_radius(&self, level: usize) -> usize {
        let sigma = self.params.radius * (level as f64 + 1.0) / (2.0 * self.params.radial_q as f64);
        (sigma.round() as usize).max(1)
    }

    /// Computes the rectified gradient layer for each orientation bin.
    fn orientation_layers(image: &FloatImage, bins: usize) -> Vec<Vec<f32>> {
        let n = image.pixel_count();
        let mut layers = vec![vec![0.0f32; n]; bins];
        let directions: Vec<(f32, f32)> = (0..bins)
            .map(|b| {
                let theta = 2.0 * PI * b as f32 / bins as f32;
                (theta.cos(), theta.sin())
            })
            .collect();

        for y in 0..image.rows {
            for x in 0..image.cols {
                let (xi, yi) = (x as isize, y as isize);
                let dx = 0.5 * (image.get_clamped(xi + 1, yi) - image.get_clamped(xi - 1, yi));
                let dy = 0.5 * (image.get_clamped(xi, yi + 1) - image.get_clamped(xi, yi - 1));
                let index = y * image.cols + x;
                for (layer, &(c, s)) in layers.iter_mut().zip(&directions) {
                    layer[index] = (c * dx + s * dy).max(0.0);
                }
            }
        }
        layers
    }

    /// Separable box filter with clamped borders.
    fn box_blur(layer: &[f32], rows: usize, cols: usize, radius: usize) -> Vec<f32> {
        let r = radius as isize;
        let norm = 1.0 / (2 * radius + 1) as f32;
        let mut horizontal = vec![0.0f32; layer.len()];
        for y in 0..rows {
            let row = &layer[y * cols..(y + 1) * cols];
            for x in 0..cols {
                let mut sum = 0.0;
                for dx in -r..=r {
                    let xx = (x as isize + dx).clamp(0, cols as isize - 1) as usize;
                    sum += row[xx];
                }
                horizontal[y * cols + x] = sum * norm;
            }
        }
        let mut result = vec![0.0f32; layer.len()];
        for y in 0..rows {
            for x in 0..cols {
                let mut sum = 0.0;
                for dy in -r..=r {
                    let yy = (y as isize + dy).clamp(0, rows as isize - 1) as usize;
                    sum += horizontal[yy * cols + x];
                }
                result[y * cols + x] = sum * norm;
            }
        }
        result
    }
}

impl DescriptorEngine for DaisyEngine {
    type Error = DaisyError;

    fn reset(&mut self) {
        self.image = None;
        self.layers.clear();
        self.grid.clear();
        self.descriptors.clear();
    }

    fn set_parameters(&mut self, params: &GeometricParams) {
        self.params = *params;
    }

    fn set_image(&mut self, image: FloatImage) {
        self.image = Some(image);
    }

    fn initialize_single_descriptor_mode(&mut self) -> Result<(), DaisyError> {
        self.params
            .validate()
            .map_err(|e| DaisyError::InvalidParameters(e.to_string()))?;
        let image = self.image.as_ref().ok_or(DaisyError::NoImage)?;
        let bins = self.params.histogram_q;
        let levels = self.params.radial_q + 1;

        let raw = Self::orientation_layers(image, bins);
        let mut layers = Vec::with_capacity(levels * bins);
        for level in 0..levels {
            let radius = self.level_blur_radius(level);
            trace!("smoothing level {level} with box radius {radius}");
            for layer in &raw {
                layers.push(Self::box_blur(layer, image.rows, image.cols, radius));
            }
        }

        let mut grid = Vec::with_capacity(self.params.radial_q * self.params.angular_q);
        for ring in 1..=self.params.radial_q {
            let distance = self.params.radius * ring as f64 / self.params.radial_q as f64;
            for step in 0..self.params.angular_q {
                let theta = 2.0 * std::f64::consts::PI * step as f64 / self.params.angular_q as f64;
                grid.push((
                    (distance * theta.cos()).round() as isize,
                    (distance * theta.sin()).round() as isize,
                    ring,
                ));
            }
        }

        self.layers = layers;
        self.grid = grid;
        Ok(())
    }

    fn compute_descriptors(&mut self) -> Result<(), DaisyError> {
        let image = self.image.as_ref().ok_or(DaisyError::NoImage)?;
        if self.layers.is_empty() {
            return Err(DaisyError::NotInitialized);
        }
        let bins = self.params.histogram_q;
        let size = self.descriptor_size();
        let (rows, cols) = (image.rows, image.cols);
        let mut descriptors = vec![0.0f32; rows * cols * size];

        for y in 0..rows {
            for x in 0..cols {
                let pixel = y * cols + x;
                let out = &mut descriptors[pixel * size..(pixel + 1) * size];
                for bin in 0..bins {
                    out[bin] = self.layers[bin][pixel];
                }
                for (sample, &(dx, dy, level)) in self.grid.iter().enumerate() {
                    let sx = (x as isize + dx).clamp(0, cols as isize - 1) as usize;
                    let sy = (y as isize + dy).clamp(0, rows as isize - 1) as usize;
                    let source = sy * cols + sx;
                    let offset = (sample + 1) * bins;
                    for bin in 0..bins {
                        out[offset + bin] = self.layers[level * bins + bin][source];
                    }
                }
            }
        }
        trace!("computed {} raw descriptors of length {size}", rows * cols);
        self.descriptors = descriptors;
        // Only the descriptors outlive the computation.
        self.image = None;
        self.layers = Vec::new();
        Ok(())
    }

    fn normalize_descriptors(&mut self) {
        let size = self.descriptor_size();
        if size == 0 {
            return;
        }
        let mut flat_rows = 0usize;
        for row in self.descriptors.chunks_exact_mut(size) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            } else {
                flat_rows += 1;
            }
        }
        if flat_rows > 0 {
            warn!("{flat_rows} descriptors have no gradient energy and stay zero");
        }
    }

    fn descriptor_size(&self) -> usize {
        (1 + self.params.radial_q * self.params.angular_q) * self.params.histogram_q
    }

    fn dense_descriptors(&self) -> &[f32] {
        &self.descriptors
    }
}
