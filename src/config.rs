use anyhow::{anyhow, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::regions::MAX_DILATE_ITERATIONS;
use crate::detect::{
    DetectorSettings, DEFAULT_ACCUMULATE_WEIGHT, DEFAULT_DELTA_THRESH, DEFAULT_DILATE_ITERATIONS,
    DEFAULT_MIN_AREA,
};
use crate::frame::{PreprocessSettings, DEFAULT_BLUR_KERNEL, DEFAULT_RESIZE_WIDTH};
use crate::gate::{GateSettings, DEFAULT_MIN_MOTION_FRAMES};
use crate::ingest::SourceConfig;
use crate::preview::DEFAULT_PREVIEW_PATH;
use crate::upload::DEFAULT_DROPBOX_API_URL;

const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_RESOLUTION: [u32; 2] = [640, 480];
const DEFAULT_FPS: u32 = 16;
const DEFAULT_WARMUP_SECS: f64 = 2.5;
const DEFAULT_MIN_UPLOAD_SECS: f64 = 3.0;
const DEFAULT_DROPBOX_BASE_PATH: &str = "Surveillance";
const DEFAULT_UPLOAD_QUEUE_CAPACITY: usize = 8;
/// Upper bound for every duration key (one week).
const MAX_SECONDS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// On-disk layout. Every key is optional; missing keys take the defaults above.
#[derive(Debug, Deserialize, Default)]
struct SurveillanceConfigFile {
    source: Option<String>,
    resolution: Option<[u32; 2]>,
    fps: Option<u32>,
    camera_warmup_time: Option<f64>,
    delta_thresh: Option<u32>,
    min_area: Option<u32>,
    min_upload_seconds: Option<f64>,
    min_motion_frames: Option<u32>,
    resize_width: Option<u32>,
    blur_kernel: Option<u32>,
    accumulate_weight: Option<f32>,
    dilate_iterations: Option<u32>,
    use_dropbox: Option<bool>,
    dropbox_access_token: Option<String>,
    dropbox_base_path: Option<String>,
    dropbox_api_url: Option<String>,
    local_upload_dir: Option<PathBuf>,
    upload_queue_capacity: Option<usize>,
    show_video: Option<bool>,
    preview_path: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SurveillanceConfig {
    pub capture: CaptureSettings,
    pub detection: DetectionSettings,
    pub min_upload_seconds: f64,
    pub min_motion_frames: u32,
    pub uploads: UploadSettings,
    pub show_video: bool,
    pub preview_path: PathBuf,
    /// Directory for snapshot files. `None` means the system temp directory.
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub warmup_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub resize_width: u32,
    pub blur_kernel: u32,
    pub accumulate_weight: f32,
    pub delta_thresh: u32,
    pub dilate_iterations: u32,
    pub min_area: u32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub use_dropbox: bool,
    pub dropbox_access_token: Option<String>,
    pub dropbox_base_path: String,
    pub dropbox_api_url: String,
    pub local_upload_dir: Option<PathBuf>,
    pub queue_capacity: usize,
}

impl Default for SurveillanceConfig {
    fn default() -> Self {
        Self::from_file(SurveillanceConfigFile::default())
    }
}

impl SurveillanceConfig {
    /// Read `path`, apply `MOTION_*` overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let file_cfg = read_config_file(path)?;
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SurveillanceConfigFile) -> Self {
        let [width, height] = file.resolution.unwrap_or(DEFAULT_RESOLUTION);
        let capture = CaptureSettings {
            source: file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width,
            height,
            fps: file.fps.unwrap_or(DEFAULT_FPS),
            warmup_seconds: file.camera_warmup_time.unwrap_or(DEFAULT_WARMUP_SECS),
        };
        let detection = DetectionSettings {
            resize_width: file.resize_width.unwrap_or(DEFAULT_RESIZE_WIDTH),
            blur_kernel: file.blur_kernel.unwrap_or(DEFAULT_BLUR_KERNEL),
            accumulate_weight: file.accumulate_weight.unwrap_or(DEFAULT_ACCUMULATE_WEIGHT),
            delta_thresh: file.delta_thresh.unwrap_or(DEFAULT_DELTA_THRESH as u32),
            dilate_iterations: file.dilate_iterations.unwrap_or(DEFAULT_DILATE_ITERATIONS),
            min_area: file.min_area.unwrap_or(DEFAULT_MIN_AREA),
        };
        let uploads = UploadSettings {
            use_dropbox: file.use_dropbox.unwrap_or(false),
            dropbox_access_token: file.dropbox_access_token.filter(|t| !t.trim().is_empty()),
            dropbox_base_path: file
                .dropbox_base_path
                .unwrap_or_else(|| DEFAULT_DROPBOX_BASE_PATH.to_string()),
            dropbox_api_url: file
                .dropbox_api_url
                .unwrap_or_else(|| DEFAULT_DROPBOX_API_URL.to_string()),
            local_upload_dir: file.local_upload_dir,
            queue_capacity: file
                .upload_queue_capacity
                .unwrap_or(DEFAULT_UPLOAD_QUEUE_CAPACITY),
        };
        Self {
            capture,
            detection,
            min_upload_seconds: file.min_upload_seconds.unwrap_or(DEFAULT_MIN_UPLOAD_SECS),
            min_motion_frames: file.min_motion_frames.unwrap_or(DEFAULT_MIN_MOTION_FRAMES),
            uploads,
            show_video: file.show_video.unwrap_or(false),
            preview_path: file
                .preview_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PREVIEW_PATH)),
            temp_dir: file.temp_dir,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("MOTION_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source;
            }
        }
        if let Ok(token) = std::env::var("MOTION_DROPBOX_TOKEN") {
            if !token.trim().is_empty() {
                self.uploads.dropbox_access_token = Some(token);
            }
        }
        if let Ok(base_path) = std::env::var("MOTION_DROPBOX_BASE_PATH") {
            if !base_path.trim().is_empty() {
                self.uploads.dropbox_base_path = base_path;
            }
        }
        if let Ok(show_video) = std::env::var("MOTION_SHOW_VIDEO") {
            self.show_video = parse_bool(&show_video)
                .ok_or_else(|| anyhow!("MOTION_SHOW_VIDEO must be true or false"))?;
        }
        if let Ok(min_area) = std::env::var("MOTION_MIN_AREA") {
            self.detection.min_area = min_area
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_MIN_AREA must be a non-negative integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.capture.source.trim().is_empty() {
            return Err(anyhow!("source must not be empty"));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("resolution must be non-zero"));
        }
        check_seconds("camera_warmup_time", self.capture.warmup_seconds)?;
        check_seconds("min_upload_seconds", self.min_upload_seconds)?;

        let detection = &self.detection;
        if detection.delta_thresh > u8::MAX as u32 {
            return Err(anyhow!(
                "delta_thresh must be between 0 and 255, got {}",
                detection.delta_thresh
            ));
        }
        if !(detection.accumulate_weight > 0.0 && detection.accumulate_weight <= 1.0) {
            return Err(anyhow!(
                "accumulate_weight must be in (0, 1], got {}",
                detection.accumulate_weight
            ));
        }
        if detection.dilate_iterations > MAX_DILATE_ITERATIONS {
            return Err(anyhow!(
                "dilate_iterations must be at most {}, got {}",
                MAX_DILATE_ITERATIONS,
                detection.dilate_iterations
            ));
        }
        if detection.blur_kernel % 2 == 0 {
            return Err(anyhow!(
                "blur_kernel must be odd, got {}",
                detection.blur_kernel
            ));
        }
        if self.min_motion_frames == 0 {
            return Err(anyhow!("min_motion_frames must be at least 1"));
        }

        let uploads = &self.uploads;
        if uploads.queue_capacity == 0 {
            return Err(anyhow!("upload_queue_capacity must be at least 1"));
        }
        if uploads.use_dropbox {
            if uploads.dropbox_access_token.is_none() {
                return Err(anyhow!(
                    "dropbox_access_token is required when use_dropbox is true"
                ));
            }
            url::Url::parse(&uploads.dropbox_api_url).map_err(|e| {
                anyhow!(
                    "dropbox_api_url '{}' is not a valid url: {}",
                    uploads.dropbox_api_url,
                    e
                )
            })?;
        }
        Ok(())
    }

    pub fn warmup(&self) -> Duration {
        Duration::try_from_secs_f64(self.capture.warmup_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            location: self.capture.source.clone(),
            width: self.capture.width,
            height: self.capture.height,
            target_fps: self.capture.fps,
        }
    }

    pub fn preprocess_settings(&self) -> PreprocessSettings {
        PreprocessSettings {
            resize_width: self.detection.resize_width,
            blur_kernel: self.detection.blur_kernel,
        }
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            accumulate_weight: self.detection.accumulate_weight,
            delta_thresh: self.detection.delta_thresh.min(u8::MAX as u32) as u8,
            dilate_iterations: self.detection.dilate_iterations,
            min_area: self.detection.min_area,
        }
    }

    pub fn gate_settings(&self) -> GateSettings {
        let millis = (self.min_upload_seconds.max(0.0) * 1000.0).round() as i64;
        GateSettings {
            min_upload_interval: TimeDelta::milliseconds(millis),
            min_motion_frames: self.min_motion_frames,
        }
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn check_seconds(key: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!(
            "{} must be a non-negative number of seconds, got {}",
            key,
            value
        ));
    }
    if value > MAX_SECONDS {
        return Err(anyhow!(
            "{} must be at most {} seconds, got {}",
            key,
            MAX_SECONDS,
            value
        ));
    }
    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_config_file(path: &Path) -> Result<SurveillanceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SurveillanceConfig::default();
        assert_eq!(cfg.capture.source, "stub://camera");
        assert_eq!((cfg.capture.width, cfg.capture.height), (640, 480));
        assert_eq!(cfg.capture.fps, 16);
        assert_eq!(cfg.warmup(), Duration::from_millis(2500));
        assert_eq!(cfg.detector_settings(), DetectorSettings::default());
        assert_eq!(cfg.gate_settings(), GateSettings::default());
        assert_eq!(cfg.uploads.dropbox_base_path, "Surveillance");
        assert_eq!(cfg.uploads.queue_capacity, 8);
        assert!(!cfg.uploads.use_dropbox);
        assert!(!cfg.show_video);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn fractional_upload_interval_keeps_milliseconds() {
        let cfg = SurveillanceConfig {
            min_upload_seconds: 1.25,
            ..SurveillanceConfig::default()
        };
        assert_eq!(
            cfg.gate_settings().min_upload_interval,
            TimeDelta::milliseconds(1250)
        );
    }

    #[test]
    fn oversized_durations_are_rejected_without_panicking() {
        let mut cfg = SurveillanceConfig::default();
        cfg.capture.warmup_seconds = 1e30;

        let err = cfg.validate().expect_err("warmup too long");
        assert!(err.to_string().contains("camera_warmup_time"));
        assert_eq!(cfg.warmup(), Duration::ZERO);

        cfg.capture.warmup_seconds = MAX_SECONDS;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.warmup(), Duration::from_secs(604_800));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
