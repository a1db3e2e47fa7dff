//! `ath worker` and `ath process` - run the pipeline.

use anyhow::{bail, Context, Result};
use ath_ids::SampleId;
use ath_worker::{ProcessOutcome, Worker, WorkerConfig};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use crate::cli::context::AppContext;

/// Drain the job queue until Ctrl-C.
pub async fn worker(ctx: &AppContext) -> Result<()> {
    let config = WorkerConfig::from_config(&ctx.config);
    info!(
        database = %ctx.config.database_path.display(),
        blob_root = %ctx.config.blob_root.display(),
        format = %ctx.config.rendering_format,
        concurrency = config.concurrency,
        "Starting worker"
    );

    let handle = Worker::spawn(config, ctx.processor(), Arc::new(Notify::new()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C, shutting down...");
    handle.shutdown().await
}

/// Run one sample through the pipeline in this process.
pub async fn process(ctx: &AppContext, sample_id: &SampleId) -> Result<()> {
    let outcome = ctx
        .processor()
        .process(sample_id)
        .await
        .with_context(|| format!("Pipeline failed for sample {}", sample_id))?;

    match outcome {
        ProcessOutcome::Done { plots, .. } => {
            println!("Sample {} done, {} plots:", sample_id, plots.len());
            for plot in plots {
                println!("  {}", plot.url);
            }
            Ok(())
        }
        ProcessOutcome::ParseFailed { error } => {
            bail!("Sample {} failed to parse: {}", sample_id, error)
        }
    }
}
