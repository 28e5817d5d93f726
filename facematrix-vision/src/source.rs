use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;

/// A decoded image together with the file it came from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub image: RgbImage,
}

impl SourceImage {
    /// File name used to label matrix rows.
    pub fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// Files in `dir` (not recursive) with the given extension, sorted by name.
pub fn list_images(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing {}", dir.display()))?
            .path();
        if path.is_file() && has_extension(&path, extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Decode one file to 8-bit RGB.
pub fn load_image(path: &Path) -> Result<SourceImage> {
    let image = image::open(path)
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgb8();
    Ok(SourceImage {
        path: path.to_path_buf(),
        image,
    })
}

/// Decode every `*.{extension}` image in `dir`. Fails if there are none.
pub fn load_images(dir: &Path, extension: &str) -> Result<Vec<SourceImage>> {
    let paths = list_images(dir, extension)?;
    if paths.is_empty() {
        anyhow::bail!("no *.{} images found in {}", extension, dir.display());
    }
    log::info!("loading {} image(s) from {}", paths.len(), dir.display());
    paths.iter().map(|p| load_image(p)).collect()
}
