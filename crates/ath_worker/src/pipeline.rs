//! One pipeline run for one sample.
//!
//! Stages and the status each one commits before the next starts:
//!
//! ```text
//! uploading -> parsing -> processing -> rendering -> done
//!                 \-> failed (parse error only)
//! ```
//!
//! A parse failure is an expected outcome and ends the sample in `failed`.
//! Any later failure aborts the run and leaves the sample in the last status
//! it reached; the error is logged and returned to the caller.

use std::sync::Arc;

use ath_db::{AthDb, Plot};
use ath_ids::SampleId;
use ath_protocol::{AthConfig, PlotDescriptor, RenderingFormat, Report, SampleStatus};
use tokio::task::spawn_blocking;
use tracing::{error, info, warn};

use crate::blob_store::BlobStore;
use crate::dataset::Table;
use crate::error::{ParsingError, PipelineError};
use crate::render::{self, Renderer};
use crate::statistics;

/// The subset of [`AthConfig`] a pipeline run reads.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub csvs_bucket: String,
    pub plots_bucket: String,
    pub rendering_format: RenderingFormat,
    pub chunk_size: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &AthConfig) -> Self {
        Self {
            csvs_bucket: config.store.csvs_bucket.clone(),
            plots_bucket: config.store.plots_bucket.clone(),
            rendering_format: config.rendering_format,
            chunk_size: config.chunk_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Report and plots stored; the sample is `done`.
    Done { report: Report, plots: Vec<Plot> },
    /// The dataset was rejected; the sample is `failed` with this message.
    ParseFailed { error: String },
}

#[derive(Clone)]
pub struct SampleProcessor {
    db: AthDb,
    store: Arc<dyn BlobStore>,
    config: PipelineConfig,
}

impl SampleProcessor {
    pub fn new(db: AthDb, store: Arc<dyn BlobStore>, config: PipelineConfig) -> Self {
        Self { db, store, config }
    }

    pub fn db(&self) -> &AthDb {
        &self.db
    }

    pub async fn process(&self, sample_id: &SampleId) -> Result<ProcessOutcome, PipelineError> {
        let sample = self
            .db
            .get_sample(sample_id)
            .await?
            .ok_or_else(|| PipelineError::BadSample(format!("Sample {} not found", sample_id)))?;
        let file_name = sample.file_name.ok_or_else(|| {
            PipelineError::BadSample(format!("Sample {} has no uploaded file", sample_id))
        })?;

        self.db
            .transition_sample(sample_id, SampleStatus::Uploading, SampleStatus::Parsing)
            .await?;

        let table = match self.load_table(&file_name).await? {
            Ok(table) => table,
            Err(parse_error) => {
                let message = parse_error.to_string();
                warn!(sample_id = %sample_id, error = %message, "Dataset rejected");
                self.db.fail_sample_parsing(sample_id, &message).await?;
                return Ok(ProcessOutcome::ParseFailed { error: message });
            }
        };

        self.db
            .transition_sample(sample_id, SampleStatus::Parsing, SampleStatus::Processing)
            .await?;

        match self.analyze(sample_id, file_name, table).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    sample_id = %sample_id,
                    error = %e,
                    "Pipeline aborted, sample left in its last committed status"
                );
                Err(e)
            }
        }
    }

    /// Fetch and parse the dataset. The outer error is infrastructure, the
    /// inner one a rejected dataset.
    async fn load_table(
        &self,
        file_name: &str,
    ) -> Result<Result<Table, ParsingError>, PipelineError> {
        let store = Arc::clone(&self.store);
        let bucket = self.config.csvs_bucket.clone();
        let key = file_name.to_string();
        let chunk_size = self.config.chunk_size;

        let parsed = spawn_blocking(move || {
            let bytes = store
                .get(&bucket, &key)
                .map_err(|e| ParsingError::Unreadable(e.to_string()))?;
            Table::from_bytes(&bytes, chunk_size)
        })
        .await?;
        Ok(parsed)
    }

    /// Statistics, then charts. Each result is committed with its transition.
    async fn analyze(
        &self,
        sample_id: &SampleId,
        file_name: String,
        table: Table,
    ) -> Result<ProcessOutcome, PipelineError> {
        let table = Arc::new(table);

        let report = {
            let table = Arc::clone(&table);
            spawn_blocking(move || statistics::compute(&table)).await??
        };
        self.db.store_report(sample_id, &report).await?;

        let renderer = Renderer::new(self.config.rendering_format);
        let store = Arc::clone(&self.store);
        let bucket = self.config.plots_bucket.clone();
        let plots = spawn_blocking(move || -> Result<Vec<PlotDescriptor>, PipelineError> {
            let rendered = renderer.render(&table)?;
            Ok(render::publish(
                &rendered,
                &file_name,
                renderer.format(),
                store.as_ref(),
                &bucket,
            )?)
        })
        .await??;

        let visualization = self.db.store_visualization(sample_id, &plots).await?;
        info!(
            sample_id = %sample_id,
            observations = report.total_num_observations,
            plots = visualization.plots.len(),
            "Sample processed"
        );

        Ok(ProcessOutcome::Done {
            report,
            plots: visualization.plots,
        })
    }
}
