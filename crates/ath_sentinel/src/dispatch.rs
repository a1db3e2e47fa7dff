//! Job Dispatcher: hands a sample to the workers without waiting for it.
//!
//! Scheduling writes a row into the durable job queue and wakes any local
//! worker. At most one queued or running job exists per sample; scheduling
//! again while one is active returns that job.

use std::sync::Arc;

use ath_db::{AthDb, Enqueued};
use ath_ids::SampleId;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::Result;

#[derive(Clone)]
pub struct JobDispatcher {
    db: AthDb,
    wake: Arc<Notify>,
}

impl JobDispatcher {
    pub fn new(db: AthDb, wake: Arc<Notify>) -> Self {
        Self { db, wake }
    }

    /// Notifier the workers wait on.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    pub async fn schedule(&self, sample_id: &SampleId) -> Result<Enqueued> {
        let enqueued = self.db.enqueue_job(sample_id).await?;
        match enqueued {
            Enqueued::Created(job_id) => {
                info!(job_id, sample_id = %sample_id, "Scheduled pipeline run");
                self.wake.notify_one();
            }
            Enqueued::AlreadyActive(job_id) => {
                debug!(job_id, sample_id = %sample_id, "Pipeline run already scheduled");
            }
        }
        Ok(enqueued)
    }
}
