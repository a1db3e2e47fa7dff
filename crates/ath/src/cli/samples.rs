//! `ath samples` and `ath report` - read side of the sample store.

use anyhow::{bail, Result};
use ath_db::SampleFilter;
use ath_ids::{SampleId, UploadId};

use crate::cli::context::AppContext;
use crate::cli::output::{print_table_colored, status_color};

/// Arguments for the samples command
#[derive(Debug)]
pub struct SamplesArgs {
    pub upload_id: Option<UploadId>,
    pub skip: u32,
    pub limit: Option<u32>,
    pub json: bool,
}

pub async fn list(ctx: &AppContext, args: SamplesArgs) -> Result<()> {
    let samples = ctx
        .db
        .list_samples(&SampleFilter {
            upload_id: args.upload_id,
            skip: args.skip,
            limit: args.limit,
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&samples)?);
        return Ok(());
    }

    if samples.is_empty() {
        println!("No samples.");
        return Ok(());
    }

    let rows = samples
        .iter()
        .map(|detail| {
            let sample = &detail.sample;
            vec![
                (sample.id.to_string(), None),
                (sample.status.to_string(), Some(status_color(sample.status))),
                (sample.file_name.clone().unwrap_or_else(|| "-".to_string()), None),
                (
                    sample.started_upload_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    None,
                ),
                (
                    detail
                        .visualization
                        .as_ref()
                        .map(|v| v.plots.len().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    None,
                ),
                (sample.parsing_error.clone().unwrap_or_default(), None),
            ]
        })
        .collect();

    print_table_colored(
        &["ID", "STATUS", "FILE", "STARTED", "PLOTS", "ERROR"],
        rows,
    );
    Ok(())
}

pub async fn report(ctx: &AppContext, sample_id: &SampleId) -> Result<()> {
    match ctx.db.get_summary_statistics(sample_id).await? {
        Some(stats) => {
            println!("{}", serde_json::to_string_pretty(&stats.report)?);
            Ok(())
        }
        None => match ctx.db.get_sample(sample_id).await? {
            Some(sample) => bail!("Sample {} has no report yet (status: {})", sample_id, sample.status),
            None => bail!("Sample {} not found", sample_id),
        },
    }
}
