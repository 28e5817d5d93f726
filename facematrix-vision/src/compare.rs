//! Embedding comparison math: L2 normalization, Euclidean distance and
//! dot-product similarity.
//!
//! Every binary operation checks that both vectors have the same length and
//! fails with [`CompareError::InvalidInput`] otherwise. Zip-based truncation
//! would silently compare a prefix.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("invalid input: expected vector of length {expected}, got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    #[error("degenerate embedding: norm is zero or not finite")]
    DegenerateEmbedding,

    #[error("computation cancelled")]
    Cancelled,

    #[error("inference failed")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("embedding image {index} failed")]
    Embedding {
        index: usize,
        #[source]
        source: Box<CompareError>,
    },

    #[error("embedding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CompareError {
    /// True if the error, or the per-image error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            CompareError::Cancelled => true,
            CompareError::Embedding { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

// Squares are accumulated in f64: every finite f32 squared stays finite and
// non-zero there, so only the final result is rounded back to f32.
fn sum_of_squares(v: &[f32]) -> f64 {
    v.iter().map(|x| (*x as f64) * (*x as f64)).sum()
}

/// Square root of the sum of squares.
pub fn l2_norm(v: &[f32]) -> f32 {
    sum_of_squares(v).sqrt() as f32
}

/// Scale `v` to unit length.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, CompareError> {
    let norm = sum_of_squares(v).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(CompareError::DegenerateEmbedding);
    }
    Ok(v.iter().map(|x| (*x as f64 / norm) as f32).collect())
}

pub(crate) fn check_len(a: &[f32], b: &[f32]) -> Result<(), CompareError> {
    if a.len() != b.len() {
        return Err(CompareError::InvalidInput {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Euclidean distance, the L2 norm of `a - b`.
pub fn distance(a: &[f32], b: &[f32]) -> Result<f32, CompareError> {
    check_len(a, b)?;
    Ok(distance_unchecked(a, b))
}

/// Dot product. Equals cosine similarity when both inputs are unit vectors.
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32, CompareError> {
    check_len(a, b)?;
    Ok(similarity_unchecked(a, b))
}

// (x - y)^2 == (y - x)^2 and x * y == y * x hold exactly in IEEE arithmetic,
// so both kernels are bit-for-bit symmetric in their arguments. The f32
// difference is exact in f64, so distinct inputs never collapse to zero.
pub(crate) fn distance_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

pub(crate) fn similarity_unchecked(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum::<f64>() as f32
}
