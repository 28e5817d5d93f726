use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

/// ArcFace ResNet100 from the ONNX model zoo:
/// https://github.com/onnx/models/blob/main/vision/body_analysis/arcface/model/arcfaceresnet100-8.onnx
pub const DEFAULT_MODEL_FILE: &str = "arcfaceresnet100-8.onnx";
pub const ARCFACE_INPUT_NAME: &str = "data";
pub const ARCFACE_OUTPUT_NAME: &str = "fc1";
pub const ARCFACE_INPUT_SIZE: u32 = 112;

/// Where the recognition model lives and how its graph is wired.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub model_path: PathBuf,
    pub input_name: String,
    pub output_name: String,
    /// Side length of the square input image, in pixels
    pub input_size: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            input_name: ARCFACE_INPUT_NAME.to_string(),
            output_name: ARCFACE_OUTPUT_NAME.to_string(),
            input_size: ARCFACE_INPUT_SIZE,
        }
    }
}

pub fn session_builder() -> Result<SessionBuilder> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    Ok(builder)
}

pub fn recog_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!(
            "recognition model not found at {}; download {} from the ONNX model zoo",
            path.display(),
            DEFAULT_MODEL_FILE
        );
    }
    log::debug!("loading recognition model from {}", path.display());
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load recognition model {}", path.display()))
}
