//! Ordered, cycling collection of shader packs.
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::manifest::MANIFEST_FILE;
use crate::pack::{PackError, ShaderPack};

#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    packs: Vec<ShaderPack>,
    index: usize,
}

impl ShaderLibrary {
    /// Loads every immediate sub-directory of `root` that holds a manifest,
    /// sorted by directory name. Packs that fail to load are skipped with a
    /// warning so one broken pack does not hide the rest.
    pub fn scan(root: &Path) -> Result<Self, PackError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();

        let mut packs = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match ShaderPack::load(&dir) {
                Ok(pack) => packs.push(pack),
                Err(err) => warn!(path = %dir.display(), error = %err, "skipping shader pack"),
            }
        }
        debug!(root = %root.display(), packs = packs.len(), "scanned shader library");
        Ok(Self::from_packs(packs))
    }

    /// Like [`ShaderLibrary::scan`], but a missing or empty library falls
    /// back to the built-in passthrough pack.
    pub fn scan_or_builtin(root: &Path) -> Result<Self, PackError> {
        let library = match Self::scan(root) {
            Ok(library) => library,
            Err(PackError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                Self::from_packs(Vec::new())
            }
            Err(err) => return Err(err),
        };
        if library.is_empty() {
            info!(root = %root.display(), "no shader packs found; using built-in passthrough");
            return Ok(Self::builtin());
        }
        Ok(library)
    }

    pub fn builtin() -> Self {
        Self::from_packs(vec![ShaderPack::builtin()])
    }

    pub fn from_packs(packs: Vec<ShaderPack>) -> Self {
        Self { packs, index: 0 }
    }

    pub fn packs(&self) -> &[ShaderPack] {
        &self.packs
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&ShaderPack> {
        self.packs.get(self.index)
    }

    /// Moves to the next pack, wrapping to the first.
    pub fn advance(&mut self) {
        if !self.packs.is_empty() {
            self.index = (self.index + 1) % self.packs.len();
        }
    }

    /// Makes the pack named `query` current. Returns false if none matches.
    pub fn select(&mut self, query: &str) -> bool {
        match self.packs.iter().position(|pack| pack.matches(query)) {
            Some(index) => {
                self.index = index;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}
