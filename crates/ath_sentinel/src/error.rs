//! Error types for webhook ingestion.

use ath_db::DbError;
use ath_ids::UploadId;
use ath_protocol::HookError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// `pre-create` replayed for an upload that already has a sample.
    /// Callers answer with a conflict and must not retry.
    #[error("A sample for upload {upload_id} already exists")]
    DuplicateUpload { upload_id: UploadId },

    /// The event addressed a sample that does not exist.
    #[error("Bad sample: {0}")]
    BadSample(String),

    #[error("Malformed hook: {0}")]
    MalformedEvent(#[from] HookError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl IngestError {
    /// Whether the gateway should report this to the uploader as a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, IngestError::DuplicateUpload { .. })
    }
}
