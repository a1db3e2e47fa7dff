//! Queue-draining worker.
//!
//! Design principles:
//! - run() consumes self - can only be called once
//! - Jobs tracked with JoinHandles for bounded concurrency
//! - Woken by the dispatcher's Notify, with a poll interval as fallback
//! - Graceful shutdown via shutdown channel: active jobs finish and are recorded

use anyhow::Result;
use ath_db::AthDb;
use ath_ids::SampleId;
use ath_protocol::AthConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::{ProcessOutcome, SampleProcessor};

/// Worker configuration (plain data)
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum pipeline runs in flight
    pub concurrency: usize,
    /// How long to sleep on an empty queue when nobody wakes us
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn from_config(config: &AthConfig) -> Self {
        Self {
            concurrency: config.worker_concurrency.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

/// Handle for controlling a running worker
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    join_handle: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(()).await;
        self.join_handle.await?
    }
}

pub struct Worker {
    config: WorkerConfig,
    db: AthDb,
    processor: Arc<SampleProcessor>,
    wake: Arc<Notify>,
    result_tx: mpsc::Sender<JobResult>,
    result_rx: mpsc::Receiver<JobResult>,
    shutdown_rx: mpsc::Receiver<()>,
    active_jobs: HashMap<i64, JoinHandle<()>>,
}

/// Result from a finished pipeline run
struct JobResult {
    job_id: i64,
    sample_id: SampleId,
    outcome: std::result::Result<ProcessOutcome, String>,
}

impl Worker {
    /// Returns (Worker, shutdown sender) - call run() on Worker.
    pub fn new(
        config: WorkerConfig,
        processor: SampleProcessor,
        wake: Arc<Notify>,
    ) -> (Self, mpsc::Sender<()>) {
        let (result_tx, result_rx) = mpsc::channel(config.concurrency * 2);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        (
            Self {
                db: processor.db().clone(),
                config,
                processor: Arc::new(processor),
                wake,
                result_tx,
                result_rx,
                shutdown_rx,
                active_jobs: HashMap::new(),
            },
            shutdown_tx,
        )
    }

    /// Start a worker on its own task.
    pub fn spawn(config: WorkerConfig, processor: SampleProcessor, wake: Arc<Notify>) -> WorkerHandle {
        let (worker, shutdown_tx) = Self::new(config, processor, wake);
        WorkerHandle {
            shutdown_tx,
            join_handle: tokio::spawn(worker.run()),
        }
    }

    /// Main event loop - consumes self (can only be called once)
    pub async fn run(mut self) -> Result<()> {
        info!(concurrency = self.config.concurrency, "Worker started");

        loop {
            self.reap_completed_jobs();
            self.fill_slots().await;

            tokio::select! {
                biased;

                // Shutdown signal (highest priority)
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, waiting for {} active jobs...", self.active_jobs.len());
                    self.wait_for_all_jobs().await;
                    break;
                }

                Some(result) = self.result_rx.recv() => {
                    self.conclude(result).await;
                }

                _ = self.wake.notified() => {
                    debug!("Woken by dispatcher");
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Worker stopped");
        Ok(())
    }

    /// Claim queued jobs until every slot is busy or the queue is empty.
    async fn fill_slots(&mut self) {
        while self.active_jobs.len() < self.config.concurrency {
            match self.db.pop_job().await {
                Ok(Some(job)) => self.start_job(job.id, job.sample_id),
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to claim job");
                    break;
                }
            }
        }
    }

    fn start_job(&mut self, job_id: i64, sample_id: SampleId) {
        info!(job_id, sample_id = %sample_id, "Starting pipeline run");
        let processor = Arc::clone(&self.processor);
        let result_tx = self.result_tx.clone();

        let handle = tokio::spawn(async move {
            let outcome = processor
                .process(&sample_id)
                .await
                .map_err(|e| e.to_string());
            let result = JobResult {
                job_id,
                sample_id,
                outcome,
            };
            if result_tx.send(result).await.is_err() {
                warn!(job_id, "Worker gone before job result could be recorded");
            }
        });
        self.active_jobs.insert(job_id, handle);
    }

    /// Remove completed job handles from active_jobs map
    fn reap_completed_jobs(&mut self) {
        self.active_jobs.retain(|job_id, handle| {
            if handle.is_finished() {
                debug!("Reaped completed job {}", job_id);
                false
            } else {
                true
            }
        });
    }

    /// Wait for all active jobs and record their results.
    async fn wait_for_all_jobs(&mut self) {
        let job_count = self.active_jobs.len();
        info!("Graceful shutdown: waiting for {} active jobs to complete...", job_count);

        for (job_id, handle) in self.active_jobs.drain() {
            debug!("Waiting for job {} to complete...", job_id);
            if let Err(e) = handle.await {
                warn!("Job {} task panicked during shutdown: {:?}", job_id, e);
            }
        }

        let mut concluded = 0;
        while let Ok(result) = self.result_rx.try_recv() {
            self.conclude(result).await;
            concluded += 1;
        }

        info!("Graceful shutdown complete: recorded {} job results", concluded);
    }

    async fn conclude(&self, result: JobResult) {
        let recorded = match &result.outcome {
            Ok(ProcessOutcome::Done { plots, .. }) => {
                info!(job_id = result.job_id, sample_id = %result.sample_id, plots = plots.len(), "Job completed");
                self.db.complete_job(result.job_id).await
            }
            Ok(ProcessOutcome::ParseFailed { error }) => {
                info!(job_id = result.job_id, sample_id = %result.sample_id, error = %error, "Job completed, dataset rejected");
                self.db.complete_job(result.job_id).await
            }
            Err(message) => {
                error!(job_id = result.job_id, sample_id = %result.sample_id, error = %message, "Job failed");
                self.db.fail_job(result.job_id, message).await
            }
        };

        if let Err(e) = recorded {
            error!(job_id = result.job_id, error = %e, "Failed to record job result");
        }
    }
}
