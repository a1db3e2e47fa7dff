//! Database schema creation. All CREATE TABLE statements live here.

use crate::error::Result;
use crate::AthDb;
use tracing::info;

impl AthDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_sample_tables().await?;
        self.create_queue_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Samples and the records derived from them.
    async fn create_sample_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sample (
                id TEXT PRIMARY KEY,
                upload_id TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'uploading',
                file_name TEXT,
                started_upload_at INTEGER NOT NULL,
                finished_upload_at INTEGER,
                parsing_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // UNIQUE(sample_id): at most one report per sample
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS summary_statistics (
                id TEXT PRIMARY KEY,
                sample_id TEXT NOT NULL UNIQUE REFERENCES sample(id),
                report TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // UNIQUE(sample_id): at most one visualization per sample
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS visualization (
                id TEXT PRIMARY KEY,
                sample_id TEXT NOT NULL UNIQUE REFERENCES sample(id),
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS plot (
                id TEXT PRIMARY KEY,
                visualization_id TEXT NOT NULL REFERENCES visualization(id),
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                url TEXT NOT NULL,
                UNIQUE(visualization_id, position)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sample_status ON sample(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sample_created ON sample(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Durable pipeline job queue.
    async fn create_queue_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS ath_job_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sample_id TEXT NOT NULL REFERENCES sample(id),
                status TEXT NOT NULL DEFAULT 'QUEUED',
                attempts INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                claim_time TEXT,
                end_time TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // At most one active job per sample
        sqlx::query(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_job_queue_active_sample
               ON ath_job_queue(sample_id)
               WHERE status IN ('QUEUED', 'RUNNING')"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_queue_status ON ath_job_queue(status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
