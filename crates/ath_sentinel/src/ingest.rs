//! Webhook Ingestor: upload gateway events into sample creation and updates.
//!
//! Responds as soon as the event is recorded; pipeline work is only scheduled.

use ath_db::{AthDb, DbError, Enqueued, Sample};
use ath_ids::SampleId;
use ath_protocol::{HookBody, HookName, UploadEvent};
use tracing::{debug, info, warn};

use crate::dispatch::JobDispatcher;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// `pre-create`: a new sample in `uploading`.
    Registered { sample: Sample },
    /// `post-finish`: file recorded and a pipeline run queued.
    Scheduled { sample_id: SampleId, job: Enqueued },
    /// Hook that does not drive the pipeline, or a replayed `post-finish`.
    Ignored,
}

#[derive(Clone)]
pub struct WebhookIngestor {
    db: AthDb,
    dispatcher: JobDispatcher,
}

impl WebhookIngestor {
    pub fn new(db: AthDb, dispatcher: JobDispatcher) -> Self {
        Self { db, dispatcher }
    }

    /// Parse and handle one raw gateway hook.
    pub async fn handle_hook(&self, name: HookName, body: &HookBody) -> Result<IngestOutcome> {
        match UploadEvent::from_hook(name, body)? {
            Some(event) => self.handle(event).await,
            None => {
                debug!(hook = %name, "Ignoring hook");
                Ok(IngestOutcome::Ignored)
            }
        }
    }

    pub async fn handle(&self, event: UploadEvent) -> Result<IngestOutcome> {
        match event {
            UploadEvent::PreCreate { upload_id, .. } => {
                match self.db.create_sample(&upload_id).await {
                    Ok(sample) => {
                        info!(sample_id = %sample.id, upload_id = %upload_id, "Registered upload");
                        Ok(IngestOutcome::Registered { sample })
                    }
                    Err(DbError::Constraint(_)) => {
                        warn!(upload_id = %upload_id, "Rejected duplicate upload");
                        Err(IngestError::DuplicateUpload { upload_id })
                    }
                    Err(e) => Err(e.into()),
                }
            }
            UploadEvent::PostFinish {
                upload_id,
                storage_key,
                ..
            } => {
                let recorded = self
                    .db
                    .record_upload_finished(&upload_id, &storage_key)
                    .await
                    .map_err(|e| match e {
                        DbError::NotFound(_) => {
                            IngestError::BadSample(format!("No sample for upload {}", upload_id))
                        }
                        other => other.into(),
                    })?;

                let Some(sample) = recorded else {
                    warn!(
                        upload_id = %upload_id,
                        file_name = %storage_key,
                        "Ignoring post-finish for a sample already finished or past uploading"
                    );
                    return Ok(IngestOutcome::Ignored);
                };
                info!(sample_id = %sample.id, file_name = %storage_key, "Upload finished");

                let job = self.dispatcher.schedule(&sample.id).await?;
                Ok(IngestOutcome::Scheduled {
                    sample_id: sample.id,
                    job,
                })
            }
        }
    }
}
