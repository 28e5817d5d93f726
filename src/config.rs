use anyhow::{Context, Result};
use directories::ProjectDirs;
use facematrix_vision::model::{self, ModelOptions};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = option_env!("FACEMATRIX_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    ProjectDirs::from("", "", "facematrix")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("facematrix.toml"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_path: PathBuf,
    pub input_name: String,
    pub output_name: String,
    pub input_size: u32,
    /// Image file extension picked up from the folder
    pub extension: String,
    pub images_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let model = ModelOptions::default();
        Self {
            model_path: model.model_path,
            input_name: model.input_name,
            output_name: model.output_name,
            input_size: model.input_size,
            extension: "png".to_string(),
            images_dir: PathBuf::from("images"),
        }
    }
}

impl Config {
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            model_path: self.model_path.clone(),
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
            input_size: self.input_size,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            anyhow::bail!("input_size must be positive");
        }
        if self.extension.trim_start_matches('.').is_empty() {
            anyhow::bail!("extension must not be empty");
        }
        if self.input_size != model::ARCFACE_INPUT_SIZE {
            log::warn!(
                "input_size {} differs from the ArcFace default {}",
                self.input_size,
                model::ARCFACE_INPUT_SIZE
            );
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
