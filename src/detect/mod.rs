mod background;
mod motion;
pub mod regions;
mod result;

pub use background::BackgroundModel;
pub use motion::{
    DetectorSettings, MotionDetector, DEFAULT_ACCUMULATE_WEIGHT, DEFAULT_DELTA_THRESH,
    DEFAULT_DILATE_ITERATIONS, DEFAULT_MIN_AREA,
};
pub use result::{MotionRegion, Observation, Occupancy};
