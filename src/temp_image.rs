//! Uniquely named snapshot files.
//!
//! `TempImage` only reserves a name; writing the file and deleting it are up
//! to the caller. Deletion is explicit and not tied to `Drop`: every exit path
//! that created the file must call `cleanup()`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSION: &str = ".jpg";

#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
}

impl TempImage {
    /// Reserve `{base_dir}/{random hex}{ext}`. A missing leading '.' is added to `ext`.
    pub fn new(base_dir: impl AsRef<Path>, ext: &str) -> Self {
        let name = hex::encode(rand::random::<[u8; 16]>());
        let ext = match ext {
            "" => String::new(),
            e if e.starts_with('.') => e.to_string(),
            e => format!(".{}", e),
        };
        Self {
            path: base_dir.as_ref().join(format!("{}{}", name, ext)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Fails when it does not exist, including on a second call.
    pub fn cleanup(&self) -> Result<()> {
        std::fs::remove_file(&self.path)
            .with_context(|| format!("remove temp image {}", self.path.display()))
    }
}
