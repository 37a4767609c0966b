use image::{GrayImage, Luma};
use imageproc::map::map_colors2;

/// Exponentially weighted running average of grayscale frames.
///
/// Values are kept as `f32` so slow drifts (lighting changes) accumulate
/// instead of being lost to integer rounding.
#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundModel {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl BackgroundModel {
    /// Start a model from a single frame.
    pub fn seed(gray: &GrayImage) -> Self {
        Self {
            width: gray.width(),
            height: gray.height(),
            values: gray.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn matches(&self, gray: &GrayImage) -> bool {
        gray.dimensions() == self.dimensions()
    }

    pub fn value_at(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    /// `model = alpha * current + (1 - alpha) * model`.
    ///
    /// Callers must check `matches` first; extra or missing pixels are ignored.
    pub fn accumulate(&mut self, gray: &GrayImage, alpha: f32) {
        let keep = 1.0 - alpha;
        for (avg, &px) in self.values.iter_mut().zip(gray.as_raw()) {
            *avg = alpha * px as f32 + keep * *avg;
        }
    }

    /// The model rounded and saturated back to 8-bit intensities.
    pub fn rounded(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([saturate_u8(self.value_at(x, y))])
        })
    }

    /// Per-pixel `|current - rounded(model)|`.
    ///
    /// A frame of a different size yields an all-zero delta.
    pub fn abs_diff(&self, gray: &GrayImage) -> GrayImage {
        if !self.matches(gray) {
            return GrayImage::new(self.width, self.height);
        }
        map_colors2(gray, &self.rounded(), |Luma([px]), Luma([avg])| {
            Luma([px.abs_diff(avg)])
        })
    }
}

/// Halves round to the nearest even value, then clamp to `0..=255`.
fn saturate_u8(value: f32) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_moves_halfway_with_default_weight() {
        let mut model = BackgroundModel::seed(&GrayImage::from_pixel(2, 2, Luma([100])));
        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5);
        assert_eq!(model.value_at(1, 1), 150.0);

        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200])), 0.5);
        assert_eq!(model.value_at(0, 0), 175.0);
    }

    #[test]
    fn rounded_model_saturates_and_rounds() {
        let mut model = BackgroundModel::seed(&GrayImage::from_pixel(1, 1, Luma([10])));
        model.accumulate(&GrayImage::from_pixel(1, 1, Luma([11])), 0.6);
        // 0.6 * 11 + 0.4 * 10 = 10.6
        assert_eq!(model.rounded().get_pixel(0, 0).0[0], 11);
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(saturate_u8(100.5), 100);
        assert_eq!(saturate_u8(101.5), 102);
        assert_eq!(saturate_u8(254.5), 254);
        assert_eq!(saturate_u8(300.0), 255);
        assert_eq!(saturate_u8(-3.0), 0);

        let mut model = BackgroundModel::seed(&GrayImage::from_pixel(1, 1, Luma([100])));
        model.accumulate(&GrayImage::from_pixel(1, 1, Luma([101])), 0.5);
        assert_eq!(model.value_at(0, 0), 100.5);
        assert_eq!(model.rounded().get_pixel(0, 0).0[0], 100);
        assert_eq!(
            model.abs_diff(&GrayImage::from_pixel(1, 1, Luma([101]))).get_pixel(0, 0).0[0],
            1
        );
    }

    #[test]
    fn abs_diff_of_mismatched_frame_is_empty() {
        let model = BackgroundModel::seed(&GrayImage::from_pixel(4, 3, Luma([10])));
        let diff = model.abs_diff(&GrayImage::from_pixel(3, 4, Luma([200])));
        assert_eq!(diff.dimensions(), (4, 3));
        assert!(diff.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn abs_diff_is_symmetric_per_pixel() {
        let model = BackgroundModel::seed(&GrayImage::from_raw(2, 1, vec![50, 200]).unwrap());
        let current = GrayImage::from_raw(2, 1, vec![80, 20]).unwrap();

        let diff = model.abs_diff(&current);

        assert_eq!(diff.as_raw(), &vec![30, 180]);
    }

    #[test]
    fn matches_checks_dimensions() {
        let model = BackgroundModel::seed(&GrayImage::new(4, 3));
        assert!(model.matches(&GrayImage::new(4, 3)));
        assert!(!model.matches(&GrayImage::new(3, 4)));
    }
}
