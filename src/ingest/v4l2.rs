//! V4L2 camera source.
//!
//! Captures from a local device node (e.g. `/dev/video0`) through memory
//! mapped buffers. The device is asked for RGB24 when it advertises it and
//! YUYV otherwise; YUYV frames are converted in-process.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::RgbImage;
use ouroboros::self_referencing;
use std::time::{Duration, Instant};
use v4l::video::Capture;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CapturedFrame, SourceConfig, SourceStats};

const CAPTURE_BUFFERS: u32 = 4;
/// Minimum time without a frame before the camera is reported unhealthy.
const MIN_STALL: Duration = Duration::from_secs(2);
/// Preferred first.
const PREFERRED_FORMATS: [PixelFormat; 2] = [PixelFormat::Rgb24, PixelFormat::Yuyv];

pub(crate) struct V4l2Camera {
    config: SourceConfig,
    capture: Option<MappedCapture>,
    geometry: Geometry,
    stall_after: Duration,
    frames: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

#[derive(Clone, Copy, Debug)]
struct Geometry {
    width: u32,
    height: u32,
    format: PixelFormat,
}

#[self_referencing]
struct MappedCapture {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub(crate) fn new(config: SourceConfig) -> Self {
        let stall_after = super::frame_interval(config.target_fps)
            .map(|interval| interval * 6)
            .unwrap_or(MIN_STALL)
            .max(MIN_STALL);
        Self {
            geometry: Geometry {
                width: config.width,
                height: config.height,
                format: PixelFormat::Rgb24,
            },
            config,
            capture: None,
            stall_after,
            frames: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        let location = self.config.location.trim().to_string();
        let mut device = v4l::Device::with_path(&location)
            .with_context(|| format!("open camera {}", location))?;

        self.geometry = negotiate(&mut device, &self.config)
            .with_context(|| format!("configure camera {}", location))?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("camera {}: could not set {} fps: {}", location, self.config.target_fps, err);
            }
        }

        let capture = MappedCaptureBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(
                    device,
                    v4l::buffer::Type::VideoCapture,
                    CAPTURE_BUFFERS,
                )
                .map_err(|err| anyhow::Error::new(err).context("map camera buffers"))
            },
        }
        .try_build();
        match capture {
            Ok(capture) => {
                self.capture = Some(capture);
                self.last_error = None;
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        }

        log::info!(
            "camera {} streaming {}x{} {:?}",
            location,
            self.geometry.width,
            self.geometry.height,
            self.geometry.format
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<CapturedFrame> {
        use v4l::io::traits::CaptureStream;

        let Geometry {
            width,
            height,
            format,
        } = self.geometry;
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| anyhow!("camera {} is not connected", self.config.location))?;

        let converted = capture.with_mut(|fields| {
            let (buf, _meta) = fields.stream.next().context("dequeue camera buffer")?;
            normalize_to_rgb(buf, width, height, format)
        });
        let rgb = match converted {
            Ok(rgb) => rgb,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };
        let image = RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| anyhow!("camera frame does not fill {}x{}", width, height))?;

        self.frames += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(CapturedFrame {
            image,
            timestamp: Local::now(),
        })
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
            && self
                .last_frame_at
                .map_or(true, |at| at.elapsed() <= self.stall_after)
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames,
            source: self.config.location.clone(),
        }
    }
}

/// Pick the best advertised pixel format and apply the requested size.
fn negotiate(device: &mut v4l::Device, config: &SourceConfig) -> Result<Geometry> {
    let advertised: Vec<[u8; 4]> = device
        .enum_formats()
        .context("list pixel formats")?
        .into_iter()
        .map(|desc| desc.fourcc.repr)
        .collect();
    let wanted = PREFERRED_FORMATS
        .into_iter()
        .find(|format| advertised.contains(&format.fourcc()))
        .ok_or_else(|| anyhow!("camera offers neither RGB3 nor YUYV"))?;

    let mut requested = device.format().context("read pixel format")?;
    requested.width = config.width;
    requested.height = config.height;
    requested.fourcc = v4l::FourCC::new(&wanted.fourcc());

    let active = device
        .set_format(&requested)
        .context("set pixel format")?;
    let format = PixelFormat::from_fourcc(&active.fourcc.repr)
        .ok_or_else(|| anyhow!("driver switched to unsupported pixel format {}", active.fourcc))?;
    if (active.width, active.height) != (config.width, config.height) {
        log::warn!(
            "camera adjusted {}x{} to {}x{}",
            config.width,
            config.height,
            active.width,
            active.height
        );
    }
    Ok(Geometry {
        width: active.width,
        height: active.height,
        format,
    })
}
