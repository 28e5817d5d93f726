//! Pairwise distance / similarity matrices over an embedding set.
//!
//! Cells are filled for the upper triangle and mirrored. The per-cell kernels
//! are exactly symmetric, so the result is identical to evaluating every
//! ordered pair.

use std::sync::Arc;

use image::RgbImage;
use log::{debug, info};
use ndarray::Array2;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::compare::{self, CompareError};
use crate::embedder::{embed_image, Embedder};
use crate::face::Embedding;

/// Receives progress while a run is in flight.
pub trait Progress: Sync {
    /// `done` of `total` images have been embedded.
    fn embedded(&self, _done: usize, _total: usize) {}

    /// `done` of `total` matrix cells have been filled.
    fn cells(&self, _done: usize, _total: usize) {}
}

/// Discards all progress.
pub struct NoProgress;

impl Progress for NoProgress {}

/// Distance and similarity matrices from one run, rows in input order.
#[derive(Debug, Clone, Serialize)]
pub struct Matrices {
    pub distance: Array2<f32>,
    pub similarity: Array2<f32>,
}

impl Matrices {
    pub fn len(&self) -> usize {
        self.distance.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }
}

fn check_lengths<V: AsRef<[f32]>>(set: &[V]) -> Result<(), CompareError> {
    if let Some(first) = set.first() {
        let first = first.as_ref();
        for v in &set[1..] {
            compare::check_len(first, v.as_ref())?;
        }
    }
    Ok(())
}

fn fill<V, F>(set: &[V], cell: F) -> Array2<f32>
where
    V: AsRef<[f32]>,
    F: Fn(&[f32], &[f32]) -> f32,
{
    let n = set.len();
    let mut m = Array2::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let v = cell(set[i].as_ref(), set[j].as_ref());
            m[[i, j]] = v;
            m[[j, i]] = v;
        }
    }
    m
}

/// N×N Euclidean distance matrix.
pub fn distance_matrix<V: AsRef<[f32]>>(set: &[V]) -> Result<Array2<f32>, CompareError> {
    check_lengths(set)?;
    Ok(fill(set, compare::distance_unchecked))
}

/// N×N dot-product similarity matrix. Inputs are expected to be normalized.
pub fn similarity_matrix<V: AsRef<[f32]>>(set: &[V]) -> Result<Array2<f32>, CompareError> {
    check_lengths(set)?;
    Ok(fill(set, compare::similarity_unchecked))
}

/// Both matrices in one pass, reporting filled cells to `progress`.
pub fn matrices<V: AsRef<[f32]>>(
    set: &[V],
    progress: &dyn Progress,
) -> Result<Matrices, CompareError> {
    check_lengths(set)?;

    let n = set.len();
    let total = n * n;
    let mut distance = Array2::zeros((n, n));
    let mut similarity = Array2::zeros((n, n));
    let mut done = 0;

    for i in 0..n {
        let a = set[i].as_ref();
        for j in i..n {
            let b = set[j].as_ref();
            let d = compare::distance_unchecked(a, b);
            let s = compare::similarity_unchecked(a, b);
            distance[[i, j]] = d;
            distance[[j, i]] = d;
            similarity[[i, j]] = s;
            similarity[[j, i]] = s;
            done += if i == j { 1 } else { 2 };
        }
        progress.cells(done, total);
    }

    Ok(Matrices {
        distance,
        similarity,
    })
}

/// Embed every image on the blocking pool, one task per image, and wait for
/// all of them.
///
/// Any failure cancels the tasks that have not started yet and fails the
/// whole call; embeddings are returned only when every image succeeded.
pub async fn embed_all<E>(
    embedder: Arc<E>,
    images: Vec<RgbImage>,
    cancel: &CancellationToken,
    progress: &dyn Progress,
) -> Result<Vec<Embedding>, CompareError>
where
    E: Embedder + ?Sized + 'static,
{
    if cancel.is_cancelled() {
        return Err(CompareError::Cancelled);
    }

    let total = images.len();
    let scope = cancel.child_token();
    let mut tasks = JoinSet::new();
    for (index, image) in images.into_iter().enumerate() {
        let embedder = Arc::clone(&embedder);
        let token = scope.clone();
        tasks.spawn_blocking(move || (index, embed_image(&*embedder, &image, &token)));
    }

    let mut slots: Vec<Option<Embedding>> = (0..total).map(|_| None).collect();
    let mut done = 0;
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(r) => r,
            Err(e) => {
                scope.cancel();
                return Err(CompareError::Task(e));
            }
        };
        match result {
            Ok(embedding) => {
                debug!("image {} embedded, {} values", index, embedding.len());
                slots[index] = Some(embedding);
                done += 1;
                progress.embedded(done, total);
            }
            Err(e) => {
                scope.cancel();
                return Err(match e {
                    CompareError::Cancelled => CompareError::Cancelled,
                    other => CompareError::Embedding {
                        index,
                        source: Box::new(other),
                    },
                });
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or(CompareError::Cancelled))
        .collect()
}

/// Embed `images` concurrently, then build both matrices.
///
/// All or nothing: an embedding failure or a cancellation observed at any
/// point before the matrices are filled yields an error, never a partial
/// result.
pub async fn compute_matrices<E>(
    embedder: Arc<E>,
    images: Vec<RgbImage>,
    cancel: &CancellationToken,
    progress: &dyn Progress,
) -> Result<Matrices, CompareError>
where
    E: Embedder + ?Sized + 'static,
{
    let n = images.len();
    info!("embedding {} image(s)", n);
    let embeddings = embed_all(embedder, images, cancel, progress).await?;

    // Calls already inside the runtime when cancel fired may all have finished.
    if cancel.is_cancelled() {
        return Err(CompareError::Cancelled);
    }

    info!("comparing {} embedding(s)", n);
    matrices(&embeddings, progress)
}
