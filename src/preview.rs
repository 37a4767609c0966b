//! Live preview.
//!
//! The annotated frame is written to a JPEG that any image viewer can keep
//! open. Writes go to a sibling `.partial` file first and are renamed into
//! place, so a viewer never reads a half-written frame. Typing the quit key
//! followed by Enter on stdin stops the loop.

use anyhow::{Context, Result};
use image::RgbImage;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_PREVIEW_PATH: &str = "preview.jpg";
pub const QUIT_KEY: char = 'q';

pub struct Preview {
    path: PathBuf,
    partial: PathBuf,
}

impl Preview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut partial = path.clone().into_os_string();
        partial.push(".partial");
        Self {
            path,
            partial: PathBuf::from(partial),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn show(&self, frame: &RgbImage) -> Result<()> {
        frame
            .save_with_format(&self.partial, image::ImageFormat::Jpeg)
            .with_context(|| format!("write preview {}", self.partial.display()))?;
        std::fs::rename(&self.partial, &self.path)
            .with_context(|| format!("publish preview {}", self.path.display()))
    }
}

/// Watch stdin for the quit key and raise `stop` when it is entered.
pub fn spawn_quit_watcher(key: char, stop: Arc<AtomicBool>) -> Result<()> {
    std::thread::Builder::new()
        .name("quit-watcher".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if is_quit_command(&line, key) {
                    log::info!("quit key pressed");
                    stop.store(true, Ordering::SeqCst);
                    break;
                }
            }
        })
        .context("spawn quit watcher")?;
    Ok(())
}

pub fn is_quit_command(line: &str, key: char) -> bool {
    let mut chars = line.trim().chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&key))
}
