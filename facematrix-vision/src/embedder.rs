use anyhow::Result;
use image::RgbImage;
use ndarray::Array4;
use tokio_util::sync::CancellationToken;

use crate::compare::CompareError;
use crate::face::Embedding;

/// Maps a decoded RGB image to a raw embedding vector.
///
/// Implementations are shared across blocking tasks, so any inner inference
/// handle must serialize its own use (see [`crate::face::ArcFace`]).
pub trait Embedder: Send + Sync {
    /// Build the NCHW input tensor for one image.
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>>;

    /// Run inference on a prepared tensor and return the raw, unnormalized vector.
    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>>;
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), CompareError> {
    if cancel.is_cancelled() {
        return Err(CompareError::Cancelled);
    }
    Ok(())
}

/// Embed one image: check cancellation, build the tensor, check again, run
/// inference, then L2-normalize the result.
///
/// A call already inside [`Embedder::infer`] is not interrupted by cancellation.
pub fn embed_image<E: Embedder + ?Sized>(
    embedder: &E,
    image: &RgbImage,
    cancel: &CancellationToken,
) -> Result<Embedding, CompareError> {
    check_cancelled(cancel)?;
    let input = embedder
        .preprocess(image)
        .map_err(|e| CompareError::Inference(e.into()))?;

    check_cancelled(cancel)?;
    let raw = embedder
        .infer(input)
        .map_err(|e| CompareError::Inference(e.into()))?;

    Embedding::from_raw(raw)
}
