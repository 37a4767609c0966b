//! Snapshot uploads.
//!
//! An `Uploader` pushes one encoded snapshot to its destination and reports
//! what it stored. Uploaders are only ever driven from the `UploadWorker`
//! thread, never from the capture loop, so a slow or failing upload cannot
//! hold up frame acquisition.

mod dropbox;
mod local;
mod worker;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};

use crate::annotate::format_timestamp;
use crate::config::SurveillanceConfig;

pub use dropbox::{DropboxConfig, DropboxUploader, DEFAULT_DROPBOX_API_URL};
pub use local::DirectoryUploader;
pub use worker::{SubmitOutcome, UploadJob, UploadStats, UploadWorker};

/// What an uploader stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub destination: String,
    pub bytes: usize,
    /// Identifier assigned by the remote service, when it returns one.
    pub remote_id: Option<String>,
}

pub trait Uploader: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn upload(&mut self, bytes: &[u8], destination: &str) -> Result<UploadReceipt>;
}

/// Remote path for a snapshot: `/{base_path}/{timestamp}.jpg`.
pub fn destination_path(base_path: &str, timestamp: &DateTime<Local>) -> String {
    let base = base_path.trim().trim_matches('/');
    let name = format_timestamp(timestamp);
    if base.is_empty() {
        format!("/{}.jpg", name)
    } else {
        format!("/{}/{}.jpg", base, name)
    }
}

/// Build the uploader the configuration asks for, if any.
///
/// Dropbox takes precedence over a local upload directory.
pub fn build_uploader(config: &SurveillanceConfig) -> Result<Option<Box<dyn Uploader>>> {
    let uploads = &config.uploads;
    if uploads.use_dropbox {
        let access_token = uploads
            .dropbox_access_token
            .clone()
            .ok_or_else(|| anyhow!("use_dropbox requires dropbox_access_token"))?;
        if uploads.local_upload_dir.is_some() {
            log::warn!("both dropbox and local_upload_dir configured; using dropbox");
        }
        let uploader = DropboxUploader::new(DropboxConfig {
            access_token,
            api_url: uploads.dropbox_api_url.clone(),
        })?;
        log::info!("[SUCCESS] dropbox account linked");
        return Ok(Some(Box::new(uploader)));
    }
    if let Some(dir) = &uploads.local_upload_dir {
        log::info!("saving snapshots under {}", dir.display());
        return Ok(Some(Box::new(DirectoryUploader::new(dir.clone()))));
    }
    Ok(None)
}
