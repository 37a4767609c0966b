use anyhow::{anyhow, Context, Result};
use std::path::{Component, PathBuf};

use super::{UploadReceipt, Uploader};

/// Stores snapshots under a local directory, mirroring the remote layout.
///
/// Colons in the destination are replaced with `-` so the timestamped names
/// stay valid on every filesystem.
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path a destination maps to.
    pub fn resolve(&self, destination: &str) -> Result<PathBuf> {
        let relative = PathBuf::from(destination.trim_start_matches('/').replace(':', "-"));
        if relative.as_os_str().is_empty() {
            return Err(anyhow!("empty upload destination"));
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(anyhow!(
                    "upload destination {} escapes the upload directory",
                    destination
                ));
            }
        }
        Ok(self.root.join(relative))
    }
}

impl Uploader for DirectoryUploader {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn upload(&mut self, bytes: &[u8], destination: &str) -> Result<UploadReceipt> {
        let path = self.resolve(destination)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create upload directory {}", parent.display()))?;
        }
        std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(UploadReceipt {
            destination: path.display().to_string(),
            bytes: bytes.len(),
            remote_id: None,
        })
    }
}
