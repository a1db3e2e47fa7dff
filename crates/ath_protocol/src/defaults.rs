//! Canonical default values shared by the CLI, the pipeline and the worker.

use crate::types::RenderingFormat;

pub const DEFAULT_RENDERING_FORMAT: RenderingFormat = RenderingFormat::Png;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

pub const DEFAULT_EXTERNAL_BASE_URL: &str = "http://localhost:9000";
pub const DEFAULT_CSVS_BUCKET: &str = "csvs";
pub const DEFAULT_PLOTS_BUCKET: &str = "plots";

pub const DATABASE_FILE_NAME: &str = "ath.sqlite";
pub const BLOB_DIR_NAME: &str = "blobs";
pub const CONFIG_FILE_NAME: &str = "config.toml";
