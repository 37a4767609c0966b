//! motion_watch - motion-triggered camera snapshots
//!
//! This daemon:
//! 1. Loads the JSON/TOML configuration named by `--conf`
//! 2. Connects the configured camera and waits for it to warm up
//! 3. Classifies every frame against a running background average
//! 4. Queues a snapshot for upload after sustained motion, at most once per
//!    `min_upload_seconds`
//!
//! Ctrl-C stops the loop. With `show_video` enabled, entering `q` on stdin
//! does too.

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motion_watch::{
    preview::{spawn_quit_watcher, QUIT_KEY},
    upload::build_uploader,
    CameraSource, FrameSource, Surveillance, SurveillanceConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-triggered camera snapshots")]
struct Args {
    /// Path to the JSON configuration file (`.toml` is read as TOML).
    #[arg(short = 'c', long = "conf")]
    conf: PathBuf,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = SurveillanceConfig::load(&args.conf)?;
    log::info!("configuration loaded from {}", args.conf.display());

    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = stop.clone();
    ctrlc::set_handler(move || {
        stop_signal.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    if cfg.show_video {
        spawn_quit_watcher(QUIT_KEY, stop.clone())?;
        log::info!(
            "preview written to {}; enter '{}' to quit",
            cfg.preview_path.display(),
            QUIT_KEY
        );
    }

    let uploader = build_uploader(&cfg)?;
    if uploader.is_none() {
        log::warn!("no uploader configured; motion is logged only");
    }

    let mut source = CameraSource::new(cfg.source_config())?;
    source.connect()?;

    log::info!("[INFO] warming up...");
    std::thread::sleep(cfg.warmup());

    let mut surveillance = Surveillance::new(&cfg, uploader, Local::now())?;
    log::info!(
        "motion_watch running: source={} delta_thresh={} min_area={} min_upload_seconds={} min_motion_frames={}",
        cfg.capture.source,
        cfg.detection.delta_thresh,
        cfg.detection.min_area,
        cfg.min_upload_seconds,
        cfg.min_motion_frames
    );

    let run_result = surveillance.run(&mut source, &stop, args.max_frames);
    let stats = surveillance.finish()?;
    let summary = run_result?;

    log::info!(
        "processed {} frames ({} occupied), {} snapshots triggered",
        summary.frames_processed,
        summary.occupied_frames,
        summary.uploads_triggered
    );
    log::info!(
        "uploads: {} succeeded, {} failed, {} dropped",
        stats.uploaded,
        stats.failed,
        stats.dropped
    );
    Ok(())
}
