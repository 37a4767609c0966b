//! Per-frame preprocessing.
//!
//! A `Frame` pairs the colour image that gets annotated and uploaded with the
//! smoothed grayscale image the detector works on. Both are produced once per
//! loop iteration and dropped at the end of it; only the grayscale values
//! survive, folded into the background model.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

pub const DEFAULT_RESIZE_WIDTH: u32 = 500;
pub const DEFAULT_BLUR_KERNEL: u32 = 21;

/// How raw captures are normalised before detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreprocessSettings {
    /// Processing width in pixels. Height follows the aspect ratio. Zero keeps the capture size.
    pub resize_width: u32,
    /// Gaussian kernel size (odd). A kernel of 1 disables smoothing.
    pub blur_kernel: u32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            resize_width: DEFAULT_RESIZE_WIDTH,
            blur_kernel: DEFAULT_BLUR_KERNEL,
        }
    }
}

/// One captured frame, ready for detection.
pub struct Frame {
    color: RgbImage,
    gray: GrayImage,
    pub timestamp: DateTime<Local>,
}

impl Frame {
    pub fn from_rgb(
        image: RgbImage,
        timestamp: DateTime<Local>,
        settings: &PreprocessSettings,
    ) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!(
                "cannot process empty frame ({}x{})",
                image.width(),
                image.height()
            ));
        }

        let color = resize_to_width(image, settings.resize_width);
        let luma = imageops::grayscale(&color);
        let gray = if settings.blur_kernel > 1 {
            imageops::blur(&luma, blur_sigma(settings.blur_kernel))
        } else {
            luma
        };

        Ok(Self {
            color,
            gray,
            timestamp,
        })
    }

    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }

    pub fn color(&self) -> &RgbImage {
        &self.color
    }

    pub fn color_mut(&mut self) -> &mut RgbImage {
        &mut self.color
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }
}

/// Gaussian sigma matching a square kernel of `kernel` pixels.
pub fn blur_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn resize_to_width(image: RgbImage, width: u32) -> RgbImage {
    if width == 0 || image.width() == width {
        return image;
    }
    let scaled = image.height() as u64 * width as u64 / image.width() as u64;
    let height = (scaled as u32).max(1);
    imageops::resize(&image, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn resizes_to_processing_width_keeping_aspect() -> Result<()> {
        let image = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        let frame = Frame::from_rgb(image, Local::now(), &PreprocessSettings::default())?;

        assert_eq!(frame.width(), 500);
        assert_eq!(frame.height(), 375);
        assert_eq!(frame.gray().dimensions(), (500, 375));
        Ok(())
    }

    #[test]
    fn zero_width_keeps_capture_size_and_kernel_one_skips_blur() -> Result<()> {
        let mut image = RgbImage::from_pixel(8, 6, Rgb([0, 0, 0]));
        image.put_pixel(3, 3, Rgb([255, 255, 255]));
        let settings = PreprocessSettings {
            resize_width: 0,
            blur_kernel: 1,
        };

        let frame = Frame::from_rgb(image, Local::now(), &settings)?;

        assert_eq!(frame.gray().dimensions(), (8, 6));
        assert_eq!(frame.gray().get_pixel(3, 3).0[0], 255);
        assert_eq!(frame.gray().get_pixel(2, 3).0[0], 0);
        Ok(())
    }

    #[test]
    fn blur_spreads_a_bright_pixel() -> Result<()> {
        let mut image = RgbImage::from_pixel(21, 21, Rgb([0, 0, 0]));
        image.put_pixel(10, 10, Rgb([255, 255, 255]));
        let settings = PreprocessSettings {
            resize_width: 0,
            blur_kernel: 21,
        };

        let frame = Frame::from_rgb(image, Local::now(), &settings)?;

        assert!(frame.gray().get_pixel(10, 10).0[0] < 255);
        assert!(frame.gray().get_pixel(11, 10).0[0] > 0);
        Ok(())
    }

    #[test]
    fn empty_frames_are_rejected() {
        let image = RgbImage::new(0, 0);
        assert!(Frame::from_rgb(image, Local::now(), &PreprocessSettings::default()).is_err());
    }

    #[test]
    fn sigma_for_default_kernel() {
        assert!((blur_sigma(21) - 3.5).abs() < 1e-6);
    }
}
