use anyhow::Result;
use chrono::Local;
use image::{Rgb, RgbImage};

use super::{CapturedFrame, Pacer, SourceConfig, SourceStats};

/// Frames per scene cycle.
pub(crate) const SCENE_PERIOD: u64 = 90;
/// Frames within a cycle during which a bright block crosses the scene.
pub(crate) const MOTION_FRAMES: std::ops::Range<u64> = 30..60;

const BLOCK_COLOR: Rgb<u8> = Rgb([235, 235, 235]);

/// Deterministic synthetic scene.
///
/// A static gradient background; for part of every cycle a bright square
/// slides across it from left to right, then disappears.
pub(crate) struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    pacer: Pacer,
}

impl SyntheticSource {
    pub(crate) fn new(config: SourceConfig) -> Self {
        Self {
            pacer: Pacer::new(config.target_fps),
            config,
            frame_count: 0,
        }
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.location,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<CapturedFrame> {
        self.pacer.wait();
        let image = render_scene(self.config.width, self.config.height, self.frame_count);
        self.frame_count += 1;
        Ok(CapturedFrame {
            image,
            timestamp: Local::now(),
        })
    }

    pub(crate) fn is_healthy(&self) -> bool {
        true
    }

    pub(crate) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.location.clone(),
        }
    }
}

/// Render frame `index` of the synthetic scene.
pub(crate) fn render_scene(width: u32, height: u32, index: u64) -> RgbImage {
    let mut image = RgbImage::from_fn(width, height, |x, y| {
        let r = 40 + (x * 60 / width.max(1)) as u8;
        let g = 50 + (y * 60 / height.max(1)) as u8;
        Rgb([r, g, 70])
    });

    let phase = index % SCENE_PERIOD;
    if MOTION_FRAMES.contains(&phase) {
        let size = (width.min(height) / 4).max(1);
        let steps = MOTION_FRAMES.end - MOTION_FRAMES.start;
        let travel = width.saturating_sub(size) as u64;
        let bx = ((phase - MOTION_FRAMES.start) * travel / steps) as u32;
        let by = height.saturating_sub(size) / 2;
        for y in by..(by + size).min(height) {
            for x in bx..(bx + size).min(width) {
                image.put_pixel(x, y, BLOCK_COLOR);
            }
        }
    }

    image
}
