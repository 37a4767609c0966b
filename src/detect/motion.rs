use image::GrayImage;

use crate::detect::background::BackgroundModel;
use crate::detect::regions::{dilate, extract_regions, threshold};
use crate::detect::result::Observation;
use crate::frame::Frame;

pub const DEFAULT_ACCUMULATE_WEIGHT: f32 = 0.5;
pub const DEFAULT_DELTA_THRESH: u8 = 5;
pub const DEFAULT_DILATE_ITERATIONS: u32 = 2;
pub const DEFAULT_MIN_AREA: u32 = 5000;

/// Tuning knobs for `MotionDetector`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Weight of the current frame in the running average, in (0, 1].
    pub accumulate_weight: f32,
    /// Intensity difference a pixel must exceed to count as changed.
    pub delta_thresh: u8,
    pub dilate_iterations: u32,
    /// Regions whose outer border encloses less area than this are ignored.
    pub min_area: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            accumulate_weight: DEFAULT_ACCUMULATE_WEIGHT,
            delta_thresh: DEFAULT_DELTA_THRESH,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

/// Frame-differencing motion detector with a running background average.
///
/// The first frame only seeds the background model and is always reported as
/// unoccupied. Every later frame is first folded into the model and then
/// compared against it.
pub struct MotionDetector {
    settings: DetectorSettings,
    model: Option<BackgroundModel>,
}

impl MotionDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            model: None,
        }
    }

    pub fn background(&self) -> Option<&BackgroundModel> {
        self.model.as_ref()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.model.is_some()
    }

    pub fn observe(&mut self, frame: &Frame) -> Observation {
        self.observe_gray(frame.gray())
    }

    pub fn observe_gray(&mut self, gray: &GrayImage) -> Observation {
        let reseed = match &self.model {
            Some(model) if model.matches(gray) => false,
            Some(model) => {
                log::warn!(
                    "frame size changed from {:?} to {:?}; restarting background model",
                    model.dimensions(),
                    gray.dimensions()
                );
                true
            }
            None => {
                log::info!("starting background model...");
                true
            }
        };
        if reseed {
            self.model = Some(BackgroundModel::seed(gray));
            return Observation::bootstrap();
        }
        let Some(model) = self.model.as_mut() else {
            return Observation::bootstrap();
        };

        model.accumulate(gray, self.settings.accumulate_weight);
        let delta = model.abs_diff(gray);
        let mask = threshold(&delta, self.settings.delta_thresh);
        let mask = dilate(&mask, self.settings.dilate_iterations);

        let min_area = self.settings.min_area;
        let regions: Vec<_> = extract_regions(&mask)
            .into_iter()
            .filter(|region| region.area >= min_area)
            .collect();

        log::debug!("motion regions above min_area: {}", regions.len());
        Observation::from_regions(regions)
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(DetectorSettings::default())
    }
}
