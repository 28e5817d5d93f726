use std::sync::Arc;

use anyhow::Result;
use facematrix_vision::{compute_matrices, CompareError, Embedder, NoProgress};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use tokio_util::sync::CancellationToken;

/// Embeds a 1x1 image as its raw [r, g, b] values.
struct PixelEmbedder;

impl Embedder for PixelEmbedder {
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let p = image.get_pixel(0, 0);
        Ok(Array4::from_shape_vec(
            (1, 3, 1, 1),
            vec![p[0] as f32, p[1] as f32, p[2] as f32],
        )?)
    }

    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        Ok(input.iter().copied().collect())
    }
}

/// Fails on any pixel whose red channel is 99.
struct FlakyEmbedder;

impl Embedder for FlakyEmbedder {
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        PixelEmbedder.preprocess(image)
    }

    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        if input[[0, 0, 0, 0]] == 99.0 {
            anyhow::bail!("inference exploded");
        }
        PixelEmbedder.infer(input)
    }
}

/// Raises the cancellation signal from inside the inference call.
struct CancellingEmbedder {
    cancel: CancellationToken,
}

impl Embedder for CancellingEmbedder {
    fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        PixelEmbedder.preprocess(image)
    }

    fn infer(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        self.cancel.cancel();
        PixelEmbedder.infer(input)
    }
}

fn pixel(r: u8, g: u8, b: u8) -> RgbImage {
    RgbImage::from_pixel(1, 1, Rgb([r, g, b]))
}

fn scenario_images() -> Vec<RgbImage> {
    vec![pixel(1, 0, 0), pixel(0, 1, 0), pixel(1, 1, 0)]
}

#[tokio::test]
async fn test_matrices_from_images() -> Result<()> {
    let cancel = CancellationToken::new();
    let m = compute_matrices(
        Arc::new(PixelEmbedder),
        scenario_images(),
        &cancel,
        &NoProgress,
    )
    .await?;

    assert_eq!(m.len(), 3);
    assert_eq!(m.similarity[[0, 1]], 0.0);
    assert!((m.similarity[[0, 2]] - 0.70710677).abs() < 1e-6);
    assert!((m.similarity[[1, 2]] - 0.70710677).abs() < 1e-6);
    // embeddings are normalized, so unit vectors at right angles
    assert!((m.distance[[0, 1]] - 2f32.sqrt()).abs() < 1e-6);
    for i in 0..3 {
        assert_eq!(m.distance[[i, i]], 0.0);
        assert!((m.similarity[[i, i]] - 1.0).abs() < 1e-6);
    }
    Ok(())
}

#[tokio::test]
async fn test_order_follows_input() -> Result<()> {
    let images: Vec<RgbImage> = (1..=16u8).map(|i| pixel(i, 255 - i, 3)).collect();
    let cancel = CancellationToken::new();
    let m = compute_matrices(Arc::new(PixelEmbedder), images.clone(), &cancel, &NoProgress).await?;

    let expected: Vec<Vec<f32>> = images
        .iter()
        .map(|img| {
            let p = img.get_pixel(0, 0);
            facematrix_vision::compare::normalize(&[p[0] as f32, p[1] as f32, p[2] as f32])
                .unwrap()
        })
        .collect();
    let s = facematrix_vision::matrix::similarity_matrix(&expected)?;
    assert_eq!(m.similarity, s);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_before_start_returns_no_matrix() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = compute_matrices(
        Arc::new(PixelEmbedder),
        scenario_images(),
        &cancel,
        &NoProgress,
    )
    .await;
    assert!(matches!(result, Err(CompareError::Cancelled)));
}

#[tokio::test]
async fn test_cancelled_during_inference_returns_no_matrix() {
    let cancel = CancellationToken::new();
    let embedder = Arc::new(CancellingEmbedder {
        cancel: cancel.clone(),
    });
    let result = compute_matrices(embedder, scenario_images(), &cancel, &NoProgress).await;
    let err = result.unwrap_err();
    assert!(err.is_cancelled(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_one_failure_fails_whole_run() {
    let cancel = CancellationToken::new();
    let images = vec![pixel(1, 2, 3), pixel(99, 0, 0), pixel(4, 5, 6)];
    let result = compute_matrices(Arc::new(FlakyEmbedder), images, &cancel, &NoProgress).await;
    match result {
        Err(CompareError::Embedding { index, source }) => {
            assert_eq!(index, 1);
            assert!(matches!(*source, CompareError::Inference(_)));
        }
        other => panic!("expected embedding failure, got {other:?}"),
    }
    // the caller's token is left alone
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn test_black_image_is_degenerate() {
    let cancel = CancellationToken::new();
    let images = vec![pixel(1, 2, 3), pixel(0, 0, 0)];
    let result = compute_matrices(Arc::new(PixelEmbedder), images, &cancel, &NoProgress).await;
    match result {
        Err(CompareError::Embedding { index, source }) => {
            assert_eq!(index, 1);
            assert!(matches!(*source, CompareError::DegenerateEmbedding));
        }
        other => panic!("expected degenerate embedding, got {other:?}"),
    }
}

#[tokio::test]
async fn test_trait_object_embedder() -> Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::new(PixelEmbedder);
    let cancel = CancellationToken::new();
    let m = compute_matrices(embedder, vec![pixel(5, 5, 5)], &cancel, &NoProgress).await?;
    assert_eq!(m.len(), 1);
    assert_eq!(m.distance[[0, 0]], 0.0);
    Ok(())
}
