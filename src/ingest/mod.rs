//! Frame sources.
//!
//! This module provides the sources the capture loop pulls frames from:
//! - Synthetic scenes (`stub://...`) for tests and demos
//! - Directories of still images, replayed in file name order
//! - USB/V4L2 camera devices (feature: ingest-v4l2)
//!
//! Every source hands out RGB frames stamped with their local capture time.
//! Sources pace themselves to the configured frame rate; a rate of zero
//! disables pacing.

mod directory;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod stub;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::Path;
use std::time::{Duration, Instant};

use directory::DirectorySource;
use stub::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
use v4l2::V4l2Camera;

/// One raw capture.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub image: RgbImage,
    pub timestamp: DateTime<Local>,
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Anything the capture loop can pull frames from.
pub trait FrameSource {
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame. `None` means a finite source has run out.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>`, a V4L2 device node such as `/dev/video0`, or an image directory.
    pub location: String,
    /// Requested capture width (also the synthetic scene width).
    pub width: u32,
    /// Requested capture height.
    pub height: u32,
    /// Target frame rate. Zero captures as fast as possible.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 16,
        }
    }
}

/// The configured camera, dispatched on the location string.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    Directory(DirectorySource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Camera),
}

impl CameraSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let location = config.location.trim();
        if location.is_empty() {
            return Err(anyhow!("source location must not be empty"));
        }
        let backend = if location.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSource::new(config))
        } else if location.contains("://") {
            return Err(anyhow!(
                "unsupported source '{}'; expected stub://, a device node or a directory",
                location
            ));
        } else if location.starts_with("/dev/") {
            device_backend(config)?
        } else if Path::new(location).is_dir() {
            CameraBackend::Directory(DirectorySource::new(config))
        } else {
            return Err(anyhow!("source '{}' is not a directory", location));
        };
        Ok(Self { backend })
    }
}

#[cfg(feature = "ingest-v4l2")]
fn device_backend(config: SourceConfig) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(V4l2Camera::new(config)))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn device_backend(config: SourceConfig) -> Result<CameraBackend> {
    Err(anyhow!(
        "camera device {} requires the ingest-v4l2 feature",
        config.location.trim()
    ))
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            CameraBackend::Directory(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<CapturedFrame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame().map(Some),
            CameraBackend::Directory(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame().map(Some),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            CameraBackend::Directory(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            CameraBackend::Directory(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

/// Sleeps just long enough to hold a target frame rate.
pub(crate) struct Pacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(target_fps: u32) -> Self {
        Self {
            interval: frame_interval(target_fps),
            last: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

fn frame_interval(target_fps: u32) -> Option<Duration> {
    if target_fps == 0 {
        None
    } else {
        Some(Duration::from_millis(1000 / target_fps as u64))
    }
}
