use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use motion_watch::config::SurveillanceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "MOTION_SOURCE",
        "MOTION_DROPBOX_TOKEN",
        "MOTION_DROPBOX_BASE_PATH",
        "MOTION_SHOW_VIDEO",
        "MOTION_MIN_AREA",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_with_original_keys() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "show_video": true,
            "use_dropbox": true,
            "dropbox_access_token": "sl.token",
            "dropbox_base_path": "Porch",
            "min_upload_seconds": 3.5,
            "min_motion_frames": 8,
            "camera_warmup_time": 2.5,
            "delta_thresh": 5,
            "resolution": [640, 480],
            "fps": 16,
            "min_area": 5000
        }"#,
    );

    let cfg = SurveillanceConfig::load(file.path()).expect("load config");

    assert!(cfg.show_video);
    assert!(cfg.uploads.use_dropbox);
    assert_eq!(cfg.uploads.dropbox_access_token.as_deref(), Some("sl.token"));
    assert_eq!(cfg.uploads.dropbox_base_path, "Porch");
    assert_eq!(
        cfg.gate_settings().min_upload_interval,
        chrono::TimeDelta::milliseconds(3500)
    );
    assert_eq!(cfg.gate_settings().min_motion_frames, 8);
    assert_eq!(cfg.detector_settings().delta_thresh, 5);
    assert_eq!(cfg.detector_settings().min_area, 5000);
    assert_eq!(cfg.source_config().width, 640);
    assert_eq!(cfg.source_config().target_fps, 16);
    assert_eq!(cfg.warmup().as_millis(), 2500);

    clear_env();
}

#[test]
fn toml_extension_is_parsed_as_toml() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
source = "stub://garage"
resolution = [320, 240]
resize_width = 0
blur_kernel = 9
accumulate_weight = 0.25
dilate_iterations = 1
upload_queue_capacity = 2
local_upload_dir = "/srv/snapshots"
"#,
    );

    let cfg = SurveillanceConfig::load(file.path()).expect("load config");

    assert_eq!(cfg.capture.source, "stub://garage");
    assert_eq!((cfg.capture.width, cfg.capture.height), (320, 240));
    assert_eq!(cfg.preprocess_settings().resize_width, 0);
    assert_eq!(cfg.preprocess_settings().blur_kernel, 9);
    assert_eq!(cfg.detector_settings().accumulate_weight, 0.25);
    assert_eq!(cfg.detector_settings().dilate_iterations, 1);
    assert_eq!(cfg.uploads.queue_capacity, 2);
    assert_eq!(
        cfg.uploads.local_upload_dir.as_deref(),
        Some(std::path::Path::new("/srv/snapshots"))
    );

    clear_env();
}

#[test]
fn env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".json", r#"{"source": "stub://front", "min_area": 5000}"#);
    std::env::set_var("MOTION_SOURCE", "stub://back");
    std::env::set_var("MOTION_DROPBOX_TOKEN", "env-token");
    std::env::set_var("MOTION_DROPBOX_BASE_PATH", "Backyard");
    std::env::set_var("MOTION_SHOW_VIDEO", "yes");
    std::env::set_var("MOTION_MIN_AREA", "1200");

    let cfg = SurveillanceConfig::load(file.path()).expect("load config");

    assert_eq!(cfg.capture.source, "stub://back");
    assert_eq!(cfg.uploads.dropbox_access_token.as_deref(), Some("env-token"));
    assert_eq!(cfg.uploads.dropbox_base_path, "Backyard");
    assert!(cfg.show_video);
    assert_eq!(cfg.detection.min_area, 1200);

    clear_env();
}

#[test]
fn malformed_env_override_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".json", "{}");
    std::env::set_var("MOTION_MIN_AREA", "lots");

    let err = SurveillanceConfig::load(file.path()).expect_err("invalid override");
    assert!(err.to_string().contains("MOTION_MIN_AREA"));

    clear_env();
}

#[test]
fn invalid_values_name_the_offending_key() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for (json, key) in [
        (r#"{"delta_thresh": 300}"#, "delta_thresh"),
        (r#"{"min_motion_frames": 0}"#, "min_motion_frames"),
        (r#"{"accumulate_weight": 0.0}"#, "accumulate_weight"),
        (r#"{"accumulate_weight": 1.5}"#, "accumulate_weight"),
        (r#"{"blur_kernel": 20}"#, "blur_kernel"),
        (r#"{"upload_queue_capacity": 0}"#, "upload_queue_capacity"),
        (r#"{"min_upload_seconds": -1.0}"#, "min_upload_seconds"),
        (r#"{"camera_warmup_time": -0.5}"#, "camera_warmup_time"),
        (r#"{"camera_warmup_time": 1e30}"#, "camera_warmup_time"),
        (r#"{"min_upload_seconds": 1e300}"#, "min_upload_seconds"),
        (r#"{"dilate_iterations": 255}"#, "dilate_iterations"),
        (r#"{"resolution": [0, 480]}"#, "resolution"),
        (r#"{"source": "  "}"#, "source"),
        (r#"{"use_dropbox": true}"#, "dropbox_access_token"),
        (
            r#"{"use_dropbox": true, "dropbox_access_token": "t", "dropbox_api_url": "nope"}"#,
            "dropbox_api_url",
        ),
    ] {
        let file = config_file(".json", json);
        let err = SurveillanceConfig::load(file.path()).expect_err(json);
        assert!(
            err.to_string().contains(key),
            "{} should mention {}, got: {}",
            json,
            key,
            err
        );
    }

    clear_env();
}

#[test]
fn unreadable_or_malformed_files_fail() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let missing = std::env::temp_dir().join("motion-watch-missing-config.json");
    assert!(SurveillanceConfig::load(&missing).is_err());

    let file = config_file(".json", "{ not json");
    let err = SurveillanceConfig::load(file.path()).expect_err("malformed");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
