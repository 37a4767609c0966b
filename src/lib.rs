//! Motion-triggered single-camera surveillance.
//!
//! The crate captures frames from one camera, compares each frame against a
//! running background average, outlines the regions that changed, and hands
//! snapshots of sustained motion to an uploader.
//!
//! # Architecture
//!
//! Two small state machines carry the core logic:
//!
//! 1. [`MotionDetector`] owns the background model and classifies every frame
//!    as [`Occupancy::Occupied`] or [`Occupancy::Unoccupied`].
//! 2. [`UploadGate`] debounces that classification stream so an upload only
//!    fires after a cooldown has elapsed *and* enough consecutive occupied
//!    frames have been seen.
//!
//! Everything else is plumbing around them:
//!
//! - `ingest`: frame sources (synthetic `stub://`, image directories, V4L2)
//! - `frame`: resize, grayscale and blur preprocessing
//! - `annotate`: bounding boxes plus the status and timestamp overlay
//! - `upload`: uploaders plus the bounded upload queue and its worker thread
//! - `temp_image`: uniquely named snapshot files with explicit cleanup
//! - `preview`: preview image output and the quit key watcher
//! - `surveillance`: the capture loop tying the pieces together

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod preview;
pub mod surveillance;
pub mod temp_image;
pub mod upload;

pub use config::SurveillanceConfig;
pub use detect::{MotionDetector, MotionRegion, Observation, Occupancy};
pub use frame::{Frame, PreprocessSettings};
pub use gate::{GateSettings, UploadGate};
pub use ingest::{CameraSource, CapturedFrame, FrameSource, SourceConfig};
pub use surveillance::{RunSummary, StepReport, Surveillance};
pub use temp_image::TempImage;
pub use upload::{UploadReceipt, UploadStats, UploadWorker, Uploader};
