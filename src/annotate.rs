use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{MotionRegion, Occupancy};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Human-readable capture time, e.g. "Friday 16 October 2026 09:41:07PM".
pub const TIMESTAMP_FORMAT: &str = "%A %d %B %Y %I:%M:%S%p";

const STATUS_SCALE: f32 = 16.0;
const TIMESTAMP_SCALE: f32 = 12.0;
const TEXT_LEFT: i32 = 10;
/// Status baseline from the top, timestamp baseline from the bottom.
const TEXT_BASELINE: i32 = 20;
const TIMESTAMP_BASELINE: i32 = 10;

static OVERLAY_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Outline every region in green.
pub fn draw_regions(image: &mut RgbImage, regions: &[MotionRegion]) {
    for region in regions {
        draw_rectangle(image, region, BOX_COLOR, BOX_THICKNESS);
    }
}

/// Draw a hollow rectangle whose outer edge is the region's bounding box.
///
/// The border grows inwards and is clipped to the image.
pub fn draw_rectangle(image: &mut RgbImage, region: &MotionRegion, color: Rgb<u8>, thickness: u32) {
    for inset in 0..thickness {
        let width = region.width.saturating_sub(2 * inset);
        let height = region.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Status and timestamp text stamped onto every analysed frame.
pub struct Overlay {
    font: FontRef<'static>,
}

impl Overlay {
    pub fn new() -> Result<Self> {
        let font = FontRef::try_from_slice(OVERLAY_FONT)
            .map_err(|e| anyhow!("load overlay font: {}", e))?;
        Ok(Self { font })
    }

    /// "Room Status: <occupancy>" at the top left, the capture time at the
    /// bottom left.
    pub fn draw_status(&self, image: &mut RgbImage, occupancy: Occupancy, timestamp: &DateTime<Local>) {
        let status = format!("Room Status: {}", occupancy);
        self.draw_line(image, &status, STATUS_SCALE, TEXT_BASELINE);

        let baseline = image.height() as i32 - TIMESTAMP_BASELINE;
        self.draw_line(image, &format_timestamp(timestamp), TIMESTAMP_SCALE, baseline);
    }

    fn draw_line(&self, image: &mut RgbImage, text: &str, scale: f32, baseline: i32) {
        let scale = PxScale::from(scale);
        // Glyphs are placed one ascent below `y`.
        let top = baseline - self.font.as_scaled(scale).ascent().round() as i32;
        draw_text_mut(image, TEXT_COLOR, TEXT_LEFT, top, scale, &self.font, text);
    }
}
