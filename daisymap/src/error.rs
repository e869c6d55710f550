use crate::matrix::ElementType;
use thiserror::Error;

/// Errors reported by descriptor extraction, resolution and matching.
///
/// Every failure is reported synchronously to the immediate caller. Shape and
/// type problems with caller-owned output buffers are detected before anything
/// is written into them.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("input image needs to be single-channel, got {channels} channels")]
    InvalidChannelCount { channels: usize },

    #[error("input image must have non-zero size, got {rows}x{cols}")]
    EmptyImage { rows: usize, cols: usize },

    #[error("illegal parameter: {0}")]
    InvalidParameters(String),

    #[error("descriptor engine has no geometric parameters")]
    NotConfigured,

    #[error("dense field is stale; compute it again before reading")]
    StaleField,

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("query points can only be F32 or I32, got {0:?}")]
    UnsupportedQueryType(ElementType),

    #[error("query {query} at ({x}, {y}) lies outside the {cols}x{rows} image")]
    IndexOutOfRange {
        query: usize,
        x: f64,
        y: f64,
        cols: usize,
        rows: usize,
    },

    #[error("descriptor engine failure: {0}")]
    EngineFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("corrupt matrix data: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
