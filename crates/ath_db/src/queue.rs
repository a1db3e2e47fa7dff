//! Durable pipeline job queue.
//!
//! At most one `QUEUED`/`RUNNING` job exists per sample (partial unique index);
//! scheduling a sample that already has one returns the existing job.

use crate::error::{DbError, Result};
use crate::samples::decode_id;
use crate::types::*;
use crate::AthDb;
use ath_ids::SampleId;
use sqlx::Row;
use tracing::debug;

impl AthDb {
    // ========================================================================
    // Job Queue Operations
    // ========================================================================

    /// Queue a pipeline run for `sample_id` unless one is already active.
    pub async fn enqueue_job(&self, sample_id: &SampleId) -> Result<Enqueued> {
        if let Some(existing) = self.active_job_id(sample_id).await? {
            return Ok(Enqueued::AlreadyActive(existing));
        }

        let inserted = sqlx::query("INSERT INTO ath_job_queue (sample_id, status) VALUES (?, 'QUEUED')")
            .bind(sample_id.as_str())
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(result) => Ok(Enqueued::Created(result.last_insert_rowid())),
            Err(e) => match DbError::from_insert(e, || format!("Active job for sample {}", sample_id)) {
                // Lost the race against a concurrent enqueue for the same sample.
                DbError::Constraint(_) => {
                    let existing = self.active_job_id(sample_id).await?.ok_or_else(|| {
                        DbError::invalid_state(format!(
                            "Active job for sample {} vanished during enqueue",
                            sample_id
                        ))
                    })?;
                    Ok(Enqueued::AlreadyActive(existing))
                }
                other => Err(other),
            },
        }
    }

    async fn active_job_id(&self, sample_id: &SampleId) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM ath_job_queue WHERE sample_id = ? AND status IN ('QUEUED', 'RUNNING')",
        )
        .bind(sample_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// Pop the oldest queued job (atomic claim).
    pub async fn pop_job(&self) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id FROM ath_job_queue
            WHERE status = 'QUEUED'
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let job_id = match row {
            Some(row) => row.get::<i64, _>("id"),
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let claimed = sqlx::query(
            r#"
            UPDATE ath_job_queue SET
                status = 'RUNNING',
                attempts = attempts + 1,
                claim_time = CURRENT_TIMESTAMP
            WHERE id = ? AND status = 'QUEUED'
            "#,
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            // Another worker claimed it between the SELECT and the UPDATE.
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        debug!(job_id, "Claimed job");

        self.get_job(job_id).await
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM ath_job_queue WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    /// Jobs of one sample, newest first.
    pub async fn list_jobs_for_sample(&self, sample_id: &SampleId) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM ath_job_queue WHERE sample_id = ? ORDER BY id DESC")
            .bind(sample_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_job).collect()
    }

    pub async fn complete_job(&self, id: i64) -> Result<()> {
        self.finish_job(id, JobStatus::Completed, None).await
    }

    pub async fn fail_job(&self, id: i64, error: &str) -> Result<()> {
        self.finish_job(id, JobStatus::Failed, Some(error)).await
    }

    async fn finish_job(&self, id: i64, status: JobStatus, error: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE ath_job_queue SET
                status = ?,
                end_time = CURRENT_TIMESTAMP,
                error_message = ?
            WHERE id = ? AND status = 'RUNNING'
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::invalid_state(format!("Job {} is not running", id)));
        }
        Ok(())
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total,
                COALESCE(SUM(CASE WHEN status = 'QUEUED' THEN 1 ELSE 0 END), 0) as queued,
                COALESCE(SUM(CASE WHEN status = 'RUNNING' THEN 1 ELSE 0 END), 0) as running,
                COALESCE(SUM(CASE WHEN status = 'COMPLETED' THEN 1 ELSE 0 END), 0) as completed,
                COALESCE(SUM(CASE WHEN status = 'FAILED' THEN 1 ELSE 0 END), 0) as failed
            FROM ath_job_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            total: row.get::<i64, _>("total") as u64,
            queued: row.get::<i64, _>("queued") as u64,
            running: row.get::<i64, _>("running") as u64,
            completed: row.get::<i64, _>("completed") as u64,
            failed: row.get::<i64, _>("failed") as u64,
        })
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
    let status_str: String = row.get("status");
    let status = JobStatus::parse(&status_str)
        .ok_or_else(|| DbError::invalid_state(format!("Unknown job status: {}", status_str)))?;
    let sample_id: String = row.get("sample_id");

    Ok(Job {
        id: row.get("id"),
        sample_id: decode_id(&sample_id)?,
        status,
        attempts: row.get("attempts"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        claim_time: row.get("claim_time"),
        end_time: row.get("end_time"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ath_ids::UploadId;
    use tempfile::TempDir;

    async fn db_with_sample() -> (TempDir, AthDb, SampleId) {
        let tmp = TempDir::new().unwrap();
        let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
        let sample = db.create_sample(&UploadId::new()).await.unwrap();
        (tmp, db, sample.id)
    }

    #[tokio::test]
    async fn enqueue_deduplicates_active_jobs() {
        let (_tmp, db, sample_id) = db_with_sample().await;

        let first = db.enqueue_job(&sample_id).await.unwrap();
        let second = db.enqueue_job(&sample_id).await.unwrap();

        assert!(matches!(first, Enqueued::Created(_)));
        assert_eq!(second, Enqueued::AlreadyActive(first.job_id()));
        assert_eq!(db.queue_stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn running_job_still_blocks_enqueue() {
        let (_tmp, db, sample_id) = db_with_sample().await;
        let first = db.enqueue_job(&sample_id).await.unwrap();

        let job = db.pop_job().await.unwrap().unwrap();
        assert_eq!(job.id, first.job_id());
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.attempts, 1);

        let again = db.enqueue_job(&sample_id).await.unwrap();
        assert_eq!(again, Enqueued::AlreadyActive(job.id));
    }

    #[tokio::test]
    async fn finished_job_allows_new_enqueue() {
        let (_tmp, db, sample_id) = db_with_sample().await;
        db.enqueue_job(&sample_id).await.unwrap();
        let job = db.pop_job().await.unwrap().unwrap();
        db.fail_job(job.id, "render failed").await.unwrap();

        let next = db.enqueue_job(&sample_id).await.unwrap();
        assert!(matches!(next, Enqueued::Created(id) if id != job.id));

        let jobs = db.list_jobs_for_sample(&sample_id).await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].status, JobStatus::Failed);
        assert_eq!(jobs[1].error_message.as_deref(), Some("render failed"));
    }

    #[tokio::test]
    async fn pop_on_empty_queue() {
        let (_tmp, db, _sample_id) = db_with_sample().await;
        assert!(db.pop_job().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completing_twice_is_rejected() {
        let (_tmp, db, sample_id) = db_with_sample().await;
        db.enqueue_job(&sample_id).await.unwrap();
        let job = db.pop_job().await.unwrap().unwrap();

        db.complete_job(job.id).await.unwrap();
        assert!(matches!(
            db.complete_job(job.id).await,
            Err(DbError::InvalidState(_))
        ));

        let stats = db.queue_stats().await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.queued + stats.running, 0);
    }
}
