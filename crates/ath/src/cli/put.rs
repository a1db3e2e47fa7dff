//! `ath put` - place a local CSV where the upload gateway would have.

use anyhow::{Context, Result};
use ath_ids::UploadId;
use ath_worker::BlobStore;
use std::path::Path;

use crate::cli::context::AppContext;

pub fn run(ctx: &AppContext, file: &Path, key: Option<String>) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    // The gateway names objects with an opaque id; mimic that by default.
    let key = key.unwrap_or_else(|| UploadId::new().as_str().replace('-', ""));

    let url = ctx
        .store
        .put(&ctx.config.store.csvs_bucket, &key, &bytes)
        .with_context(|| format!("Failed to store {}", file.display()))?;

    println!("key: {}", key);
    println!("url: {}", url);
    Ok(())
}
