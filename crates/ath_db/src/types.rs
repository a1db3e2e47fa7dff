//! Row types returned by [`crate::AthDb`].

use ath_ids::{PlotId, SampleId, SummaryStatisticsId, UploadId, VisualizationId};
use ath_protocol::{Report, SampleStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Samples
// ============================================================================

/// One uploaded dataset and its processing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub upload_id: UploadId,
    pub status: SampleStatus,
    /// Storage key of the uploaded CSV, set once the upload finished.
    pub file_name: Option<String>,
    pub started_upload_at: DateTime<Utc>,
    pub finished_upload_at: Option<DateTime<Utc>>,
    /// Set only when `status` is `failed`.
    pub parsing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub id: SummaryStatisticsId,
    pub sample_id: SampleId,
    pub report: Report,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub id: PlotId,
    pub visualization_id: VisualizationId,
    pub position: i64,
    pub name: String,
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    pub id: VisualizationId,
    pub sample_id: SampleId,
    /// Ordered by `position`.
    pub plots: Vec<Plot>,
    pub created_at: DateTime<Utc>,
}

/// A sample together with whatever the pipeline has produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDetail {
    #[serde(flatten)]
    pub sample: Sample,
    pub summary_statistics: Option<SummaryStatistics>,
    pub visualization: Option<Visualization>,
}

/// Filter for listing samples.
#[derive(Debug, Clone, Default)]
pub struct SampleFilter {
    pub upload_id: Option<UploadId>,
    pub skip: u32,
    pub limit: Option<u32>,
}

// ============================================================================
// Job queue
// ============================================================================

/// Job status in the processing queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pipeline run in the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub sample_id: SampleId,
    pub status: JobStatus,
    pub attempts: i64,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
    pub claim_time: Option<String>,
    pub end_time: Option<String>,
}

/// Result of scheduling a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// A new job row was written
    Created(i64),
    /// The sample already had a queued or running job
    AlreadyActive(i64),
}

impl Enqueued {
    pub fn job_id(&self) -> i64 {
        match self {
            Enqueued::Created(id) | Enqueued::AlreadyActive(id) => *id,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}
