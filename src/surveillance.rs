//! The capture loop.
//!
//! `Surveillance` owns the detector, the upload gate and the upload worker.
//! Each captured frame is preprocessed, classified, annotated and, when the
//! gate fires, written to a snapshot file and queued for upload. Source
//! errors end the loop; upload errors never reach it.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::annotate::{draw_regions, format_timestamp, Overlay};
use crate::config::SurveillanceConfig;
use crate::detect::{MotionDetector, Observation, Occupancy};
use crate::frame::{Frame, PreprocessSettings};
use crate::gate::UploadGate;
use crate::ingest::{CapturedFrame, FrameSource};
use crate::preview::Preview;
use crate::temp_image::{TempImage, DEFAULT_EXTENSION};
use crate::upload::{destination_path, SubmitOutcome, UploadJob, UploadStats, UploadWorker, Uploader};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What happened to one frame.
#[derive(Debug)]
pub struct StepReport {
    pub observation: Observation,
    pub upload_triggered: bool,
    /// Queue outcome of the snapshot, when one was handed to the upload worker.
    pub submitted: Option<SubmitOutcome>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub occupied_frames: u64,
    pub uploads_triggered: u64,
}

pub struct Surveillance {
    preprocess: PreprocessSettings,
    detector: MotionDetector,
    gate: UploadGate,
    worker: Option<UploadWorker>,
    base_path: String,
    snapshot_dir: PathBuf,
    preview: Option<Preview>,
    overlay: Overlay,
    last_occupancy: Occupancy,
    summary: RunSummary,
}

impl Surveillance {
    /// `started_at` starts the upload cooldown, so nothing is uploaded during
    /// the first `min_upload_seconds` of a run.
    pub fn new(
        config: &SurveillanceConfig,
        uploader: Option<Box<dyn Uploader>>,
        started_at: DateTime<Local>,
    ) -> Result<Self> {
        let worker = match uploader {
            Some(uploader) => Some(UploadWorker::spawn(
                uploader,
                config.uploads.queue_capacity,
            )?),
            None => None,
        };
        let preview = config
            .show_video
            .then(|| Preview::new(config.preview_path.clone()));
        Ok(Self {
            preprocess: config.preprocess_settings(),
            detector: MotionDetector::new(config.detector_settings()),
            gate: UploadGate::starting_at(config.gate_settings(), started_at),
            worker,
            base_path: config.uploads.dropbox_base_path.clone(),
            snapshot_dir: config.snapshot_dir(),
            preview,
            overlay: Overlay::new()?,
            last_occupancy: Occupancy::Unoccupied,
            summary: RunSummary::default(),
        })
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn step(&mut self, captured: CapturedFrame) -> Result<StepReport> {
        let mut frame = Frame::from_rgb(captured.image, captured.timestamp, &self.preprocess)?;
        let observation = self.detector.observe(&frame);
        self.summary.frames_processed += 1;

        if observation.bootstrap {
            return Ok(StepReport {
                observation,
                upload_triggered: false,
                submitted: None,
            });
        }

        log::debug!(
            "frame {}: {} region(s)",
            self.summary.frames_processed,
            observation.regions.len()
        );
        if observation.occupancy.is_occupied() {
            self.summary.occupied_frames += 1;
        }
        if observation.occupancy != self.last_occupancy {
            log::info!(
                "[{}] Room Status: {}",
                format_timestamp(&frame.timestamp),
                observation.occupancy
            );
            self.last_occupancy = observation.occupancy;
        }

        let timestamp = frame.timestamp;
        draw_regions(frame.color_mut(), &observation.regions);
        self.overlay
            .draw_status(frame.color_mut(), observation.occupancy, &timestamp);

        let upload_triggered = self.gate.evaluate(observation.occupancy, frame.timestamp);
        let submitted = if upload_triggered {
            self.summary.uploads_triggered += 1;
            self.snapshot(&frame)
        } else {
            None
        };

        if let Some(preview) = &self.preview {
            if let Err(err) = preview.show(frame.color()) {
                log::warn!("preview update failed: {:#}", err);
            }
        }

        Ok(StepReport {
            observation,
            upload_triggered,
            submitted,
        })
    }

    /// Pull frames until the source ends, `stop` is raised or `max_frames`
    /// frames have been processed.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        stop: &AtomicBool,
        max_frames: Option<u64>,
    ) -> Result<RunSummary> {
        let mut last_health_log = Instant::now();
        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested");
                break;
            }
            if max_frames.is_some_and(|max| self.summary.frames_processed >= max) {
                log::info!("processed {} frames; stopping", self.summary.frames_processed);
                break;
            }

            let Some(captured) = source.next_frame().context("capture frame")? else {
                log::info!("source exhausted");
                break;
            };
            self.step(captured)?;

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} frames={} source={} uploads={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.source,
                    self.summary.uploads_triggered
                );
                last_health_log = Instant::now();
            }
        }
        Ok(self.summary)
    }

    /// Wait for queued uploads to finish.
    pub fn finish(mut self) -> Result<UploadStats> {
        match self.worker.take() {
            Some(worker) => worker.shutdown(),
            None => Ok(UploadStats::default()),
        }
    }

    fn snapshot(&mut self, frame: &Frame) -> Option<SubmitOutcome> {
        let stamp = format_timestamp(&frame.timestamp);
        let Some(worker) = self.worker.as_mut() else {
            log::info!("[MOTION] {} (no uploader configured)", stamp);
            return None;
        };

        let snapshot = TempImage::new(&self.snapshot_dir, DEFAULT_EXTENSION);
        if let Err(err) = frame
            .color()
            .save_with_format(snapshot.path(), image::ImageFormat::Jpeg)
            .with_context(|| format!("write snapshot {}", snapshot.path().display()))
        {
            log::warn!("{:#}", err);
            if let Err(err) = snapshot.cleanup() {
                log::debug!("{:#}", err);
            }
            return None;
        }

        let destination = destination_path(&self.base_path, &frame.timestamp);
        log::info!("[UPLOAD] {}", stamp);
        Some(worker.submit(UploadJob {
            snapshot,
            destination,
            captured_at: frame.timestamp,
        }))
    }
}
