//! Headless run controller: folder selection, start / cancel, progress and
//! result text, published to observers as explicit events.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use facematrix_vision::{compute_matrices, source, Embedder, Matrices, Progress};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::report::format_matrix;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    FolderSelected(PathBuf),
    StartEnabled(bool),
    /// Images embedded so far out of the total.
    Embedded { done: usize, total: usize },
    /// Matrix cells filled, as a percentage of N².
    Progress(f64),
    DistanceText(String),
    SimilarityText(String),
    Failed(String),
}

pub trait RunObserver: Send + Sync {
    fn notify(&self, event: &RunEvent);
}

/// Logs every event through the `log` facade.
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::Embedded { done, total } => info!("embedded {}/{}", done, total),
            RunEvent::Progress(p) => log::debug!("progress {:.1}%", p),
            RunEvent::Failed(msg) => warn!("run failed: {}", msg),
            RunEvent::FolderSelected(dir) => info!("folder: {}", dir.display()),
            _ => {}
        }
    }
}

/// Snapshot of what a front-end would bind to.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub folder: Option<PathBuf>,
    pub start_enabled: bool,
    pub progress: f64,
    pub distance_text: String,
    pub similarity_text: String,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            folder: None,
            start_enabled: true,
            progress: 0.0,
            distance_text: String::new(),
            similarity_text: String::new(),
        }
    }
}

/// Result of a successful run: matrices plus the file name of each row.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub labels: Vec<String>,
    pub matrices: Matrices,
}

pub struct Runner<E: Embedder + ?Sized + 'static> {
    embedder: Arc<E>,
    extension: String,
    state: Mutex<RunState>,
    cancel: Mutex<CancellationToken>,
    observers: Vec<Arc<dyn RunObserver>>,
}

impl<E: Embedder + ?Sized + 'static> Runner<E> {
    pub fn new(embedder: Arc<E>, extension: impl Into<String>) -> Self {
        Self {
            embedder,
            extension: extension.into(),
            state: Mutex::new(RunState::default()),
            cancel: Mutex::new(CancellationToken::new()),
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn state(&self) -> RunState {
        self.lock_state().clone()
    }

    pub fn select_folder(&self, folder: &Path) {
        self.lock_state().folder = Some(folder.to_path_buf());
        self.emit(RunEvent::FolderSelected(folder.to_path_buf()));
    }

    /// Raise the cancellation signal for the current run.
    ///
    /// The signal is only cleared when a run finishes, so a cancel raised
    /// while idle or just before a run starts fails that next run.
    pub fn cancel(&self) {
        self.lock_cancel().cancel();
    }

    /// Load the selected folder, embed every image and build both matrices.
    ///
    /// Start is disabled for the duration of the run; afterwards it is
    /// re-enabled and progress is reset, whatever the outcome.
    pub async fn start(&self) -> Result<RunOutput> {
        {
            let mut state = self.lock_state();
            if !state.start_enabled {
                anyhow::bail!("a run is already in progress");
            }
            state.start_enabled = false;
        }
        self.emit(RunEvent::StartEnabled(false));

        let result = self.run().await;
        if let Err(e) = &result {
            self.emit(RunEvent::Failed(format!("{:#}", e)));
        }

        // fresh cancellation scope for the next run
        *self.lock_cancel() = CancellationToken::new();
        {
            let mut state = self.lock_state();
            state.start_enabled = true;
            state.progress = 0.0;
        }
        self.emit(RunEvent::StartEnabled(true));
        self.emit(RunEvent::Progress(0.0));
        result
    }

    async fn run(&self) -> Result<RunOutput> {
        let folder = self
            .lock_state()
            .folder
            .clone()
            .ok_or_else(|| anyhow!("no image folder selected"))?;

        let cancel = self.lock_cancel().clone();

        let extension = self.extension.clone();
        let sources = tokio::task::spawn_blocking(move || source::load_images(&folder, &extension))
            .await
            .context("image loading task failed")??;
        let labels: Vec<String> = sources.iter().map(|s| s.label()).collect();
        let images = sources.into_iter().map(|s| s.image).collect();

        let matrices = compute_matrices(Arc::clone(&self.embedder), images, &cancel, self)
            .await
            .context("computing matrices")?;

        let distance_text = format_matrix(&matrices.distance);
        let similarity_text = format_matrix(&matrices.similarity);
        {
            let mut state = self.lock_state();
            state.distance_text = distance_text.clone();
            state.similarity_text = similarity_text.clone();
        }
        self.emit(RunEvent::DistanceText(distance_text));
        self.emit(RunEvent::SimilarityText(similarity_text));

        Ok(RunOutput { labels, matrices })
    }

    fn emit(&self, event: RunEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: Embedder + ?Sized + 'static> Progress for Runner<E> {
    fn embedded(&self, done: usize, total: usize) {
        self.emit(RunEvent::Embedded { done, total });
    }

    fn cells(&self, done: usize, total: usize) {
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 / total as f64 * 100.0
        };
        self.lock_state().progress = percent;
        self.emit(RunEvent::Progress(percent));
    }
}
