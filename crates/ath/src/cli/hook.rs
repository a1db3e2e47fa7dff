//! `ath hook` - feed one upload gateway hook to the ingestor.

use anyhow::{Context, Result};
use ath_protocol::{HookBody, HookName};
use ath_sentinel::{IngestOutcome, JobDispatcher, WebhookIngestor};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::cli::context::AppContext;

/// Read a hook body from a file, or stdin when `source` is `-`.
pub fn read_body(source: &Path) -> Result<HookBody> {
    let raw = if source == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read hook body from stdin")?;
        raw
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read hook body {}", source.display()))?
    };
    serde_json::from_str(&raw).context("Hook body is not a valid gateway payload")
}

pub async fn run(ctx: &AppContext, name: HookName, body: &Path) -> Result<()> {
    let body = read_body(body)?;
    // Runs are picked up by `ath worker`, which polls the queue.
    let dispatcher = JobDispatcher::new(ctx.db.clone(), Arc::new(Notify::new()));
    let ingestor = WebhookIngestor::new(ctx.db.clone(), dispatcher);

    let outcome = ingestor
        .handle_hook(name, &body)
        .await
        .with_context(|| format!("{} hook rejected", name))?;

    let summary = match outcome {
        IngestOutcome::Registered { sample } => json!({
            "outcome": "registered",
            "sample_id": sample.id,
            "upload_id": sample.upload_id,
        }),
        IngestOutcome::Scheduled { sample_id, job } => json!({
            "outcome": "scheduled",
            "sample_id": sample_id,
            "job_id": job.job_id(),
        }),
        IngestOutcome::Ignored => json!({ "outcome": "ignored" }),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
