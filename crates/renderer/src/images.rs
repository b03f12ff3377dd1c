//! Directory-backed [`ImageProvider`].
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::backend::ImageProvider;
use crate::types::{Bounds, SourceImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Cycles through the decodable images of one directory in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryImages {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl DirectoryImages {
    /// Lists the directory once. A missing or unreadable directory is an error;
    /// an empty one yields a provider that never produces an image.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to list {}", dir.display()))?
                .path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        tracing::debug!(dir = %dir.display(), images = paths.len(), "scanned image directory");
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, cursor: 0 }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl ImageProvider for DirectoryImages {
    /// Returns the next decodable image, wrapping around. Files that fail to
    /// decode are skipped; after one full lap without success this gives up.
    fn next(&mut self) -> Option<SourceImage> {
        for _ in 0..self.paths.len() {
            let path = &self.paths[self.cursor];
            self.cursor = (self.cursor + 1) % self.paths.len();
            match decode_image(path) {
                Ok(image) => return Some(image),
                Err(err) => tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "skipping image"),
            }
        }
        None
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Decodes `path` into tightly packed RGBA8, top row first.
pub fn decode_image(path: &Path) -> Result<SourceImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image at {}", path.display()))?;
    let rgba = image.to_rgba8();
    let bounds = Bounds::new(rgba.width(), rgba.height());
    if bounds.is_empty() {
        bail!("image at {} has zero extent ({bounds})", path.display());
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceImage::new(name, bounds, rgba.into_raw()))
}
