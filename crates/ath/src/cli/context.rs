//! Configuration resolution and the handles every command needs.

use anyhow::{Context, Result};
use ath_db::AthDb;
use ath_protocol::{AthConfig, RenderingFormat};
use ath_worker::{FsBlobStore, PipelineConfig, SampleProcessor};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings that override the config file. Each also reads an `ATH_*` variable.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Config file (default: $ATH_HOME/config.toml when present)
    #[arg(long, global = true, env = "ATH_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, env = "ATH_DATABASE")]
    pub database: Option<PathBuf>,

    /// Root directory of the blob store
    #[arg(long, global = true, env = "ATH_BLOB_ROOT")]
    pub blob_root: Option<PathBuf>,

    /// Chart output format (png, svg, pdf)
    #[arg(long, global = true, env = "ATH_RENDERING_FORMAT")]
    pub rendering_format: Option<RenderingFormat>,

    /// CSV read buffer size in bytes
    #[arg(long, global = true, env = "ATH_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Maximum concurrent pipeline runs
    #[arg(long, global = true, env = "ATH_WORKER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Public base address used in plot URLs
    #[arg(long, global = true, env = "ATH_EXTERNAL_BASE_URL")]
    pub external_base_url: Option<String>,

    #[arg(long, global = true, env = "ATH_CSVS_BUCKET")]
    pub csvs_bucket: Option<String>,

    #[arg(long, global = true, env = "ATH_PLOTS_BUCKET")]
    pub plots_bucket: Option<String>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then these overrides.
    pub fn resolve(&self) -> Result<AthConfig> {
        let mut config = AthConfig::load(self.config.as_deref()).context("Failed to load config")?;
        self.apply(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut AthConfig) {
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Some(path) = &self.blob_root {
            config.blob_root = path.clone();
        }
        if let Some(format) = self.rendering_format {
            config.rendering_format = format;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(n) = self.concurrency {
            config.worker_concurrency = n;
        }
        if let Some(url) = &self.external_base_url {
            config.store.external_base_url = url.clone();
        }
        if let Some(bucket) = &self.csvs_bucket {
            config.store.csvs_bucket = bucket.clone();
        }
        if let Some(bucket) = &self.plots_bucket {
            config.store.plots_bucket = bucket.clone();
        }
    }
}

/// Open handles for one command invocation.
pub struct AppContext {
    pub config: AthConfig,
    pub db: AthDb,
    pub store: Arc<FsBlobStore>,
}

impl AppContext {
    pub async fn open(args: &ConfigArgs) -> Result<Self> {
        let config = args.resolve()?;
        let db = AthDb::open(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
        let store = Arc::new(FsBlobStore::new(
            config.blob_root.clone(),
            config.store.external_base_url.clone(),
        ));
        Ok(Self { config, db, store })
    }

    pub fn processor(&self) -> SampleProcessor {
        SampleProcessor::new(
            self.db.clone(),
            self.store.clone(),
            PipelineConfig::from_config(&self.config),
        )
    }
}
