//! Relational store for the Ath sample pipeline.
//!
//! All reads and writes of samples, reports, visualizations and the job queue
//! go through [`AthDb`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use ath_db::{AthDb, Result};
//!
//! let db = AthDb::open("~/.ath/ath.sqlite").await?;
//!
//! let sample = db.create_sample(&upload_id).await?;
//! let job = db.enqueue_job(&sample.id).await?;
//! ```

mod error;
mod schema;
mod types;

// Method implementations organized by domain
mod queue;
mod samples;
mod summary_statistics;
mod visualizations;

pub use error::{DbError, Result};
pub use types::*;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// Handle to the Ath database. Cheap to clone.
#[derive(Clone)]
pub struct AthDb {
    pool: SqlitePool,
}

impl AthDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open an existing database (fails if not exists).
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }

        let url = format!("sqlite:{}?mode=rw", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl AthDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }
}
