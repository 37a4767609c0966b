//! Background upload worker.
//!
//! The capture loop hands snapshots to a single worker thread through a
//! bounded queue. When the queue is full the snapshot is discarded rather
//! than blocking capture. Every snapshot file is deleted once it leaves the
//! pipeline, whether it was uploaded, failed, or dropped.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;

use super::Uploader;
use crate::annotate::format_timestamp;
use crate::temp_image::TempImage;

pub struct UploadJob {
    pub snapshot: TempImage,
    pub destination: String,
    pub captured_at: DateTime<Local>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    Dropped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: u64,
    pub failed: u64,
    pub dropped: u64,
}

pub struct UploadWorker {
    uploader_name: &'static str,
    sender: Option<SyncSender<UploadJob>>,
    join: Option<JoinHandle<UploadStats>>,
    dropped: u64,
}

impl UploadWorker {
    pub fn spawn(uploader: Box<dyn Uploader>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("upload queue capacity must be at least 1"));
        }
        let uploader_name = uploader.name();
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let join = std::thread::Builder::new()
            .name("upload-worker".to_string())
            .spawn(move || run_worker(uploader, receiver))
            .context("spawn upload worker")?;
        log::info!(
            "upload worker started ({} uploader, queue capacity {})",
            uploader_name,
            capacity
        );
        Ok(Self {
            uploader_name,
            sender: Some(sender),
            join: Some(join),
            dropped: 0,
        })
    }

    pub fn uploader_name(&self) -> &'static str {
        self.uploader_name
    }

    /// Hand a snapshot to the worker without blocking.
    pub fn submit(&mut self, job: UploadJob) -> SubmitOutcome {
        let Some(sender) = self.sender.as_ref() else {
            self.discard(job, "worker stopped");
            return SubmitOutcome::Dropped;
        };
        match sender.try_send(job) {
            Ok(()) => SubmitOutcome::Queued,
            Err(TrySendError::Full(job)) => {
                self.discard(job, "upload queue full");
                SubmitOutcome::Dropped
            }
            Err(TrySendError::Disconnected(job)) => {
                self.discard(job, "upload worker exited");
                SubmitOutcome::Dropped
            }
        }
    }

    /// Drain the queue, stop the worker and report what it did.
    pub fn shutdown(mut self) -> Result<UploadStats> {
        let mut stats = self.stop()?;
        stats.dropped += self.dropped;
        log::info!(
            "upload worker stopped: {} uploaded, {} failed, {} dropped",
            stats.uploaded,
            stats.failed,
            stats.dropped
        );
        Ok(stats)
    }

    fn stop(&mut self) -> Result<UploadStats> {
        // Closing the channel lets the worker finish queued jobs and exit.
        self.sender.take();
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("upload worker thread panicked")),
            None => Ok(UploadStats::default()),
        }
    }

    fn discard(&mut self, job: UploadJob, reason: &str) {
        self.dropped += 1;
        log::warn!(
            "dropping snapshot from {} ({})",
            format_timestamp(&job.captured_at),
            reason
        );
        if let Err(err) = job.snapshot.cleanup() {
            log::warn!("{:#}", err);
        }
    }
}

impl Drop for UploadWorker {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("{}", err);
        }
    }
}

fn run_worker(mut uploader: Box<dyn Uploader>, receiver: Receiver<UploadJob>) -> UploadStats {
    let mut stats = UploadStats::default();
    for job in receiver {
        match upload_one(uploader.as_mut(), &job) {
            Ok(receipt) => {
                stats.uploaded += 1;
                log::info!(
                    "[UPLOAD] {} ({} bytes via {})",
                    receipt.destination,
                    receipt.bytes,
                    uploader.name()
                );
            }
            Err(err) => {
                stats.failed += 1;
                log::warn!("upload of {} failed: {:#}", job.destination, err);
            }
        }
        if let Err(err) = job.snapshot.cleanup() {
            log::warn!("{:#}", err);
        }
    }
    stats
}

fn upload_one(uploader: &mut dyn Uploader, job: &UploadJob) -> Result<super::UploadReceipt> {
    let bytes = std::fs::read(job.snapshot.path())
        .with_context(|| format!("read snapshot {}", job.snapshot.path().display()))?;
    uploader.upload(&bytes, &job.destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadReceipt;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Uploads = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    struct RecordingUploader {
        uploads: Uploads,
    }

    impl Uploader for RecordingUploader {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn upload(&mut self, bytes: &[u8], destination: &str) -> Result<UploadReceipt> {
            self.uploads
                .lock()
                .unwrap()
                .push((destination.to_string(), bytes.to_vec()));
            Ok(UploadReceipt {
                destination: destination.to_string(),
                bytes: bytes.len(),
                remote_id: None,
            })
        }
    }

    struct FailingUploader;

    impl Uploader for FailingUploader {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn upload(&mut self, _bytes: &[u8], _destination: &str) -> Result<UploadReceipt> {
            Err(anyhow!("remote unavailable"))
        }
    }

    /// Signals when an upload starts, then waits until released.
    struct BlockingUploader {
        started: mpsc::Sender<()>,
        release: Receiver<()>,
    }

    impl Uploader for BlockingUploader {
        fn name(&self) -> &'static str {
            "blocking"
        }

        fn upload(&mut self, bytes: &[u8], destination: &str) -> Result<UploadReceipt> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Ok(UploadReceipt {
                destination: destination.to_string(),
                bytes: bytes.len(),
                remote_id: None,
            })
        }
    }

    fn snapshot_job(dir: &Path, contents: &[u8], destination: &str) -> Result<UploadJob> {
        let snapshot = TempImage::new(dir, ".jpg");
        std::fs::write(snapshot.path(), contents)?;
        Ok(UploadJob {
            snapshot,
            destination: destination.to_string(),
            captured_at: Local::now(),
        })
    }

    #[test]
    fn uploads_queued_snapshots_and_removes_them() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let uploads = Uploads::default();
        let mut worker = UploadWorker::spawn(
            Box::new(RecordingUploader {
                uploads: uploads.clone(),
            }),
            4,
        )?;

        let job = snapshot_job(dir.path(), b"first", "/Surveillance/a.jpg")?;
        let path = job.snapshot.path().to_path_buf();
        assert_eq!(worker.submit(job), SubmitOutcome::Queued);
        assert_eq!(
            worker.submit(snapshot_job(dir.path(), b"second", "/Surveillance/b.jpg")?),
            SubmitOutcome::Queued
        );

        let stats = worker.shutdown()?;
        assert_eq!(
            stats,
            UploadStats {
                uploaded: 2,
                failed: 0,
                dropped: 0
            }
        );
        let uploads = uploads.lock().unwrap();
        assert_eq!(uploads[0], ("/Surveillance/a.jpg".to_string(), b"first".to_vec()));
        assert_eq!(uploads[1].0, "/Surveillance/b.jpg");
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn failed_uploads_are_counted_and_cleaned_up() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut worker = UploadWorker::spawn(Box::new(FailingUploader), 2)?;

        worker.submit(snapshot_job(dir.path(), b"x", "/a.jpg")?);
        let stats = worker.shutdown()?;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.uploaded, 0);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn full_queue_drops_snapshot_without_blocking() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let mut worker = UploadWorker::spawn(
            Box::new(BlockingUploader {
                started: started_tx,
                release: release_rx,
            }),
            1,
        )?;

        assert_eq!(
            worker.submit(snapshot_job(dir.path(), b"1", "/1.jpg")?),
            SubmitOutcome::Queued
        );
        started_rx.recv_timeout(Duration::from_secs(5))?;

        // Worker is busy with the first job; the second fills the queue.
        assert_eq!(
            worker.submit(snapshot_job(dir.path(), b"2", "/2.jpg")?),
            SubmitOutcome::Queued
        );
        let overflow = snapshot_job(dir.path(), b"3", "/3.jpg")?;
        let overflow_path = overflow.snapshot.path().to_path_buf();
        assert_eq!(worker.submit(overflow), SubmitOutcome::Dropped);
        assert!(!overflow_path.exists());

        drop(release_tx);
        let stats = worker.shutdown()?;
        assert_eq!(
            stats,
            UploadStats {
                uploaded: 2,
                failed: 0,
                dropped: 1
            }
        );
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(UploadWorker::spawn(Box::new(FailingUploader), 0).is_err());
    }
}
