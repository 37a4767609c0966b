//! Dropbox upload client.
//!
//! Uses the content endpoint `POST /2/files/upload`: the file bytes are the
//! request body and the upload arguments travel as JSON in the
//! `Dropbox-API-Arg` header. HTTP headers must be ASCII, so any non-ASCII
//! character in the arguments is escaped as `\uXXXX`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;
use url::Url;

use super::{UploadReceipt, Uploader};

pub const DEFAULT_DROPBOX_API_URL: &str = "https://content.dropboxapi.com";

const UPLOAD_ENDPOINT: &str = "2/files/upload";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct DropboxConfig {
    pub access_token: String,
    /// Base URL of the content API. Overridable for testing.
    pub api_url: String,
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_url: DEFAULT_DROPBOX_API_URL.to_string(),
        }
    }
}

/// Subset of the file metadata Dropbox returns after an upload.
#[derive(Debug, Deserialize)]
struct FileMetadata {
    id: Option<String>,
    path_display: Option<String>,
}

pub struct DropboxUploader {
    agent: ureq::Agent,
    endpoint: Url,
    access_token: String,
}

impl DropboxUploader {
    pub fn new(config: DropboxConfig) -> Result<Self> {
        if config.access_token.trim().is_empty() {
            return Err(anyhow!("dropbox access token must not be empty"));
        }
        let mut base = Url::parse(&config.api_url)
            .with_context(|| format!("parse dropbox api url {}", config.api_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!(
                "dropbox api url must be http(s), got '{}'",
                base.scheme()
            ));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(UPLOAD_ENDPOINT)
            .context("build dropbox upload endpoint")?;

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .build();

        Ok(Self {
            agent,
            endpoint,
            access_token: config.access_token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Uploader for DropboxUploader {
    fn name(&self) -> &'static str {
        "dropbox"
    }

    fn upload(&mut self, bytes: &[u8], destination: &str) -> Result<UploadReceipt> {
        let arg = upload_arg(destination)?;
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Authorization", &format!("Bearer {}", self.access_token))
            .set("Content-Type", "application/octet-stream")
            .set("Dropbox-API-Arg", &arg)
            .send_bytes(bytes);

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(anyhow!(
                    "dropbox upload of {} failed with status {}: {}",
                    destination,
                    code,
                    body.trim()
                ));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("dropbox upload of {}", destination)))
            }
        };

        let body = response
            .into_string()
            .context("read dropbox upload response")?;
        let metadata: FileMetadata =
            serde_json::from_str(&body).context("parse dropbox upload response")?;

        Ok(UploadReceipt {
            destination: metadata
                .path_display
                .unwrap_or_else(|| destination.to_string()),
            bytes: bytes.len(),
            remote_id: metadata.id,
        })
    }
}

fn upload_arg(destination: &str) -> Result<String> {
    let arg = serde_json::json!({
        "path": destination,
        "mode": "add",
        "autorename": true,
        "mute": false,
    });
    Ok(ascii_json(&serde_json::to_string(&arg)?))
}

/// Escape every non-ASCII character of serialized JSON as `\uXXXX`.
///
/// Non-ASCII characters can only appear inside JSON strings, where the escape
/// is equivalent.
fn ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            for unit in ch.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}
