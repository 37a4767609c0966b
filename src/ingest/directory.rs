//! Image directory replay.
//!
//! Reads still images (`.jpg`, `.jpeg`, `.png`) from a local directory in
//! file name order and hands them out as frames. Each frame is stamped with
//! the time it was read, not the file's modification time. The source ends
//! after the last image.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use std::path::PathBuf;

use super::{CapturedFrame, Pacer, SourceConfig, SourceStats};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub(crate) struct DirectorySource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    next: usize,
    frame_count: u64,
    pacer: Pacer,
    last_error: Option<String>,
}

impl DirectorySource {
    pub(crate) fn new(config: SourceConfig) -> Self {
        Self {
            pacer: Pacer::new(config.target_fps),
            config,
            files: Vec::new(),
            next: 0,
            frame_count: 0,
            last_error: None,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        let root = PathBuf::from(self.config.location.trim());
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&root)
            .with_context(|| format!("read image directory {}", root.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", root.display()));
        }
        files.sort();

        log::info!(
            "DirectorySource: connected to {} ({} images)",
            root.display(),
            files.len()
        );
        self.files = files;
        self.next = 0;
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<CapturedFrame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.pacer.wait();

        let image = image::open(path)
            .with_context(|| format!("decode {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?
            .to_rgb8();

        self.next += 1;
        self.frame_count += 1;
        Ok(Some(CapturedFrame {
            image,
            timestamp: Local::now(),
        }))
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none() && !self.files.is_empty()
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.location.clone(),
        }
    }
}

fn has_image_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn config_for(dir: &std::path::Path) -> SourceConfig {
        SourceConfig {
            location: dir.display().to_string(),
            width: 0,
            height: 0,
            target_fps: 0,
        }
    }

    #[test]
    fn replays_images_in_name_order_then_ends() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(4, 3, Rgb([200, 0, 0])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(4, 3, Rgb([0, 200, 0])).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = DirectorySource::new(config_for(dir.path()));
        source.connect()?;

        let first = source.next_frame()?.expect("first image");
        assert_eq!(*first.image.get_pixel(0, 0), Rgb([0, 200, 0]));
        let second = source.next_frame()?.expect("second image");
        assert_eq!(*second.image.get_pixel(0, 0), Rgb([200, 0, 0]));
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = DirectorySource::new(config_for(dir.path()));
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
        Ok(())
    }

    #[test]
    fn corrupt_image_marks_source_unhealthy() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg")?;

        let mut source = DirectorySource::new(config_for(dir.path()));
        source.connect()?;

        assert!(source.next_frame().is_err());
        assert!(!source.is_healthy());
        Ok(())
    }
}
