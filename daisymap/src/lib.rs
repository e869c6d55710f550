//! # DaisyMap Library
//!
//! The `daisymap` library computes a dense field of per-pixel descriptors for
//! an image and resolves sparse descriptors from it by coordinate lookup. The
//! field is computed once per image; keypoints or raw coordinate matrices are
//! then mapped onto rows of that field without recomputation.
//!
//! ## Overview of Modules
//!
//! - **`matrix`**: A row-major, runtime-typed `Matrix` used for images, query
//!   coordinates and descriptor outputs, with binary serialization.
//!
//! - **`image_buffer`**: Converts a single-channel image of any element type into
//!   the `f32` buffer a descriptor engine consumes.
//!
//! - **`engine`**: The `DescriptorEngine` contract and the `GeometricParams`
//!   (radius, radial, angular and histogram quantization) it is configured with.
//!
//! - **`daisy`**: `DaisyEngine`, a DAISY-style engine implementing that contract.
//!
//! - **`binding`**: Owns one engine, re-applies its parameters before every dense
//!   computation and exposes the normalized field.
//!
//! - **`dense_field`**: A borrowed view of a computed field, row `y * cols + x`
//!   per pixel.
//!
//! - **`extractor`**: The dense extractor and its field state machine, with
//!   dense, keypoint and query-matrix entry points.
//!
//! - **`sparse`**: Resolves keypoints and coordinate matrices into descriptor rows.
//!
//! - **`features`**: Detector, extractor and matcher traits for a
//!   detect → extract → match pipeline.
//!
//! - **`grid_detector`**, **`brute_force_matcher`**, **`kd_tree_matcher`**,
//!   **`extract_and_match`**: Implementations of those traits.

pub mod error;
pub mod matrix;
pub mod image_buffer;
pub mod engine;
pub mod daisy;
pub mod binding;
pub mod dense_field;
pub mod extractor;
pub mod sparse;
pub mod keypoint;
pub mod features;
pub mod grid_detector;
pub mod brute_force_matcher;
pub mod kd_tree_matcher;
pub mod extract_and_match;

pub use binding::DescriptorEngineBinding;
pub use daisy::DaisyEngine;
pub use dense_field::DenseField;
pub use engine::{DescriptorEngine, GeometricParams};
pub use error::{DescriptorError, Result};
pub use extractor::{DaisyDescriptorExtractor, DenseDescriptorExtractor, FieldState};
pub use keypoint::KeyPoint;
pub use matrix::{ElementType, Matrix};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
