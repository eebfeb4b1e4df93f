use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::AccessionId;
use crate::error::KiraError;
use crate::ncbi::NcbiClient;

pub const BATCH_SIZE: usize = 100;
pub const MAX_WORKERS: usize = 10;

/// Fetches one accession's sequence into `destination`.
pub trait SequenceDownloader: Sync {
    fn download(&self, accession: &AccessionId, destination: &Path) -> Result<(), KiraError>;
}

impl<N: NcbiClient> SequenceDownloader for N {
    fn download(&self, accession: &AccessionId, destination: &Path) -> Result<(), KiraError> {
        self.download_sequence(accession, destination).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause a worker takes after each finished task.
    pub task_delay: Duration,
    /// Pause between two batches.
    pub batch_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            task_delay: Duration::from_millis(100),
            batch_delay: Duration::from_secs(1),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            task_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadOutcome {
    pub accession: AccessionId,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub index: usize,
    pub size: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadSummary {
    pub batches: Vec<BatchReport>,
    pub outcomes: Vec<DownloadOutcome>,
}

impl DownloadSummary {
    pub fn succeeded(&self) -> usize {
        self.batches.iter().map(|batch| batch.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|batch| batch.failed).sum()
    }

    /// Successful accessions in completion order.
    pub fn succeeded_accessions(&self) -> Vec<AccessionId> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.succeeded)
            .map(|outcome| outcome.accession.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOrchestrator {
    workers: usize,
    pacing: Pacing,
}

impl DownloadOrchestrator {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: clamp_workers(workers),
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Downloads every accession, batch by batch. Each batch drains completely
    /// before the next one starts; per-item failures become failed outcomes.
    pub fn run<D: SequenceDownloader + ?Sized>(
        &self,
        downloader: &D,
        accessions: &[AccessionId],
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> DownloadSummary {
        let total = accessions.len();
        let batch_count = total.div_ceil(BATCH_SIZE);
        let mut summary = DownloadSummary::default();
        let mut done = 0usize;

        for (index, batch) in accessions.chunks(BATCH_SIZE).enumerate() {
            if index > 0 && !self.pacing.batch_delay.is_zero() {
                thread::sleep(self.pacing.batch_delay);
            }
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Download; batch {}/{} ({} accessions)",
                    index + 1,
                    batch_count,
                    batch.len()
                ),
                elapsed: None,
            });

            let start = Instant::now();
            let mut succeeded = 0usize;
            let mut failed = 0usize;
            let outcomes = self.run_batch(downloader, batch, destination, |outcome| {
                done += 1;
                if outcome.succeeded {
                    succeeded += 1;
                    sink.event(ProgressEvent {
                        message: format!("download.ok {} [{done}/{total}]", outcome.accession),
                        elapsed: None,
                    });
                } else {
                    failed += 1;
                    sink.event(ProgressEvent {
                        message: format!(
                            "download.fail {} [{done}/{total}]: {}",
                            outcome.accession,
                            outcome.error.as_deref().unwrap_or("unknown error")
                        ),
                        elapsed: None,
                    });
                }
            });
            let elapsed = start.elapsed();
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Download; batch {} done: {succeeded} ok, {failed} failed",
                    index + 1
                ),
                elapsed: Some(elapsed),
            });

            summary.batches.push(BatchReport {
                index,
                size: batch.len(),
                succeeded,
                failed,
                elapsed_ms: elapsed.as_millis(),
            });
            summary.outcomes.extend(outcomes);
        }
        summary
    }

    fn run_batch<D, F>(
        &self,
        downloader: &D,
        batch: &[AccessionId],
        destination: &Path,
        mut on_outcome: F,
    ) -> Vec<DownloadOutcome>
    where
        D: SequenceDownloader + ?Sized,
        F: FnMut(&DownloadOutcome),
    {
        let queue = Mutex::new(batch.iter());
        let task_delay = self.pacing.task_delay;
        let workers = self.workers.min(batch.len()).max(1);
        let (tx, rx) = mpsc::channel::<DownloadOutcome>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = {
                            let mut guard = queue.lock().unwrap_or_else(|err| err.into_inner());
                            guard.next().cloned()
                        };
                        let Some(accession) = next else {
                            break;
                        };
                        let outcome = download_one(downloader, accession, destination);
                        if tx.send(outcome).is_err() {
                            break;
                        }
                        if !task_delay.is_zero() {
                            thread::sleep(task_delay);
                        }
                    }
                });
            }
            drop(tx);

            let mut outcomes = Vec::with_capacity(batch.len());
            for outcome in rx {
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
            outcomes
        })
    }
}

fn download_one<D: SequenceDownloader + ?Sized>(
    downloader: &D,
    accession: AccessionId,
    destination: &Path,
) -> DownloadOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        downloader.download(&accession, destination)
    }));
    let error = match result {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(payload) => Some(format!("download task panicked: {}", panic_message(payload.as_ref()))),
    };
    if let Some(error) = &error {
        debug!(%accession, %error, "download failed");
    }
    DownloadOutcome {
        accession,
        succeeded: error.is_none(),
        error,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub fn clamp_workers(workers: usize) -> usize {
    workers.clamp(1, MAX_WORKERS)
}

/// Creates `destination` and checks that files can be written into it.
pub fn ensure_destination(destination: &Path) -> Result<(), KiraError> {
    let not_writable = |message: String| KiraError::DestinationNotWritable {
        path: destination.to_path_buf(),
        message,
    };
    fs::create_dir_all(destination).map_err(|err| not_writable(err.to_string()))?;
    tempfile::Builder::new()
        .prefix(".kira-gr-probe")
        .tempfile_in(destination)
        .map_err(|err| not_writable(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_clamped() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(4), 4);
        assert_eq!(clamp_workers(64), MAX_WORKERS);
        assert_eq!(DownloadOrchestrator::new(25).workers(), MAX_WORKERS);
    }

    #[test]
    fn ensure_destination_creates_nested_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        ensure_destination(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(fs::read_dir(&nested).unwrap().count(), 0);
    }
}
