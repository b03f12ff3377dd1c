//! Loads one shader pack directory: the `shader.toml` manifest plus the GLSL
//! fragment source of every pass it lists.
//!
//! Types:
//!
//! - `PackError` classifies missing manifests, parse failures, validation
//!   problems (including missing pass sources) and I/O failures.
//! - `ShaderPack` is a fully loaded pack: name, description, pass sources in
//!   order and the `[defaults]` table. It does not touch the filesystem after
//!   loading.
//!
//! Functions:
//!
//! - `ShaderPack::load` reads and validates a directory.
//! - `ShaderPack::builtin` returns the passthrough pack compiled into the
//!   binary, used when no library is available.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::manifest::{DefaultValue, ShaderManifest, MANIFEST_FILE};

const PASSTHROUGH_SOURCE: &str = include_str!("builtin/passthrough.glsl");

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPack {
    name: String,
    description: Option<String>,
    root: Option<PathBuf>,
    sources: Vec<String>,
    defaults: BTreeMap<String, DefaultValue>,
}

impl ShaderPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest: ShaderManifest = toml::from_str(&manifest_raw)?;
        let mut issues = manifest.validate();

        let mut sources = Vec::with_capacity(manifest.passes.len());
        for pass in &manifest.passes {
            let source_path = root.join(pass);
            if !source_path.is_file() {
                issues.push(format!("missing shader source: {}", source_path.display()));
                continue;
            }
            sources.push(fs::read_to_string(&source_path)?);
        }
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        let name = manifest
            .name
            .clone()
            .unwrap_or_else(|| directory_name(&root));
        debug!(pack = %name, passes = sources.len(), path = %root.display(), "loaded shader pack");
        Ok(Self {
            name,
            description: manifest.description,
            root: Some(root),
            sources,
            defaults: manifest.defaults,
        })
    }

    pub fn builtin() -> Self {
        Self {
            name: "passthrough".to_string(),
            description: Some("Shows the source image unchanged".to_string()),
            root: None,
            sources: vec![PASSTHROUGH_SOURCE.to_string()],
            defaults: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Directory the pack was loaded from; `None` for the built-in pack.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn defaults(&self) -> &BTreeMap<String, DefaultValue> {
        &self.defaults
    }

    /// True when `query` names this pack by manifest name or directory name.
    pub fn matches(&self, query: &str) -> bool {
        self.name == query
            || self
                .root
                .as_deref()
                .is_some_and(|root| directory_name(root) == query)
    }
}

fn directory_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}
