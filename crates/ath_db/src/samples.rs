//! Sample rows and the status lifecycle.
//!
//! Every status change is a compare-and-set on the current status, so two
//! concurrent runs over the same sample cannot both advance it.

use crate::error::{DbError, Result};
use crate::types::*;
use crate::AthDb;
use ath_ids::{SampleId, UploadId};
use ath_protocol::SampleStatus;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

impl AthDb {
    // ========================================================================
    // Creation and lookup
    // ========================================================================

    /// Register a new sample in `uploading` state.
    ///
    /// Fails with [`DbError::Constraint`] if `upload_id` is already taken; the
    /// existing row is left untouched.
    pub async fn create_sample(&self, upload_id: &UploadId) -> Result<Sample> {
        let id = SampleId::new();
        let now = Self::now_millis();

        sqlx::query(
            r#"
            INSERT INTO sample (id, upload_id, status, started_upload_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(upload_id.as_str())
        .bind(SampleStatus::Uploading.as_str())
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, || format!("upload_id {} already exists", upload_id)))?;

        self.get_sample(&id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Sample {}", id)))
    }

    pub async fn get_sample(&self, id: &SampleId) -> Result<Option<Sample>> {
        let row = sqlx::query("SELECT * FROM sample WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_sample).transpose()
    }

    pub async fn get_sample_by_upload_id(&self, upload_id: &UploadId) -> Result<Option<Sample>> {
        let row = sqlx::query("SELECT * FROM sample WHERE upload_id = ?")
            .bind(upload_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_sample).transpose()
    }

    /// Record the storage key of a finished upload and stamp `finished_upload_at`.
    ///
    /// Only a sample still in `uploading` with no key, or with this same key,
    /// is written. Returns `None` when the sample exists but the write was
    /// refused, so a replayed or conflicting hook never replaces a recorded key.
    pub async fn record_upload_finished(
        &self,
        upload_id: &UploadId,
        file_name: &str,
    ) -> Result<Option<Sample>> {
        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            UPDATE sample SET
                file_name = ?,
                finished_upload_at = COALESCE(finished_upload_at, ?),
                updated_at = ?
            WHERE upload_id = ?
              AND status = ?
              AND (file_name IS NULL OR file_name = ?)
            "#,
        )
        .bind(file_name)
        .bind(now)
        .bind(now)
        .bind(upload_id.as_str())
        .bind(SampleStatus::Uploading.as_str())
        .bind(file_name)
        .execute(&self.pool)
        .await?;

        let sample = self
            .get_sample_by_upload_id(upload_id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Sample with upload_id {}", upload_id)))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(sample))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Move a sample from `from` to `to`.
    ///
    /// Fails with [`DbError::InvalidState`] if the edge is not part of the
    /// lifecycle or the sample is no longer in `from`.
    pub async fn transition_sample(
        &self,
        id: &SampleId,
        from: SampleStatus,
        to: SampleStatus,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        advance_status(&mut *tx, id, from, to, None).await?;
        tx.commit().await?;

        log_transition(id, from, to);
        Ok(())
    }

    /// `parsing -> failed`, recording the parse error on the sample.
    pub async fn fail_sample_parsing(&self, id: &SampleId, parsing_error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        advance_status(
            &mut *tx,
            id,
            SampleStatus::Parsing,
            SampleStatus::Failed,
            Some(parsing_error),
        )
        .await?;
        tx.commit().await?;

        log_transition(id, SampleStatus::Parsing, SampleStatus::Failed);
        Ok(())
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// List samples oldest first, each with its report and visualization.
    pub async fn list_samples(&self, filter: &SampleFilter) -> Result<Vec<SampleDetail>> {
        let upload_id = filter.upload_id.as_ref().map(|id| id.as_str());
        let limit = filter.limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query(
            r#"
            SELECT * FROM sample
            WHERE (? IS NULL OR upload_id = ?)
            ORDER BY created_at ASC, rowid ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(upload_id)
        .bind(upload_id)
        .bind(limit)
        .bind(i64::from(filter.skip))
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in &rows {
            let sample = row_to_sample(row)?;
            details.push(self.attach_relations(sample).await?);
        }
        Ok(details)
    }

    pub async fn get_sample_detail(&self, id: &SampleId) -> Result<Option<SampleDetail>> {
        match self.get_sample(id).await? {
            Some(sample) => Ok(Some(self.attach_relations(sample).await?)),
            None => Ok(None),
        }
    }

    async fn attach_relations(&self, sample: Sample) -> Result<SampleDetail> {
        let summary_statistics = self.get_summary_statistics(&sample.id).await?;
        let visualization = self.get_visualization(&sample.id).await?;
        Ok(SampleDetail {
            sample,
            summary_statistics,
            visualization,
        })
    }
}

/// Compare-and-set the status of a sample on an open connection.
pub(crate) async fn advance_status(
    conn: &mut SqliteConnection,
    id: &SampleId,
    from: SampleStatus,
    to: SampleStatus,
    parsing_error: Option<&str>,
) -> Result<()> {
    if !from.can_transition_to(to) {
        return Err(DbError::invalid_state(format!(
            "Illegal sample transition {} -> {}",
            from, to
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE sample SET
            status = ?,
            parsing_error = COALESCE(?, parsing_error),
            updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(parsing_error)
    .bind(AthDb::now_millis())
    .bind(id.as_str())
    .bind(from.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<String> = sqlx::query_scalar("SELECT status FROM sample WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match current {
        None => Err(DbError::not_found(format!("Sample {}", id))),
        Some(status) => Err(DbError::invalid_state(format!(
            "Sample {} is '{}', expected '{}'",
            id, status, from
        ))),
    }
}

pub(crate) fn log_transition(id: &SampleId, from: SampleStatus, to: SampleStatus) {
    info!(sample_id = %id, from = %from, to = %to, "Sample status changed");
}

pub(crate) fn decode_id<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| DbError::invalid_state(format!("Corrupt id '{}': {}", raw, e)))
}

fn row_to_sample(row: &SqliteRow) -> Result<Sample> {
    let status_str: String = row.get("status");
    let status = status_str
        .parse::<SampleStatus>()
        .map_err(DbError::invalid_state)?;
    let id: String = row.get("id");
    let upload_id: String = row.get("upload_id");
    let finished: Option<i64> = row.get("finished_upload_at");

    Ok(Sample {
        id: decode_id(&id)?,
        upload_id: decode_id(&upload_id)?,
        status,
        file_name: row.get("file_name"),
        started_upload_at: AthDb::millis_to_datetime(row.get("started_upload_at")),
        finished_upload_at: finished.map(AthDb::millis_to_datetime),
        parsing_error: row.get("parsing_error"),
        created_at: AthDb::millis_to_datetime(row.get("created_at")),
        updated_at: AthDb::millis_to_datetime(row.get("updated_at")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_db() -> (TempDir, AthDb) {
        let tmp = TempDir::new().unwrap();
        let db = AthDb::open(tmp.path().join("ath.sqlite")).await.unwrap();
        (tmp, db)
    }

    #[tokio::test]
    async fn create_starts_uploading() {
        let (_tmp, db) = open_db().await;
        let upload_id = UploadId::new();

        let sample = db.create_sample(&upload_id).await.unwrap();
        assert_eq!(sample.status, SampleStatus::Uploading);
        assert_eq!(sample.upload_id, upload_id);
        assert!(sample.file_name.is_none());
        assert!(sample.finished_upload_at.is_none());
        assert!(sample.parsing_error.is_none());
    }

    #[tokio::test]
    async fn duplicate_upload_id_is_a_constraint_violation() {
        let (_tmp, db) = open_db().await;
        let upload_id = UploadId::new();
        let original = db.create_sample(&upload_id).await.unwrap();

        let err = db.create_sample(&upload_id).await.unwrap_err();
        assert!(err.is_constraint(), "{}", err);

        let all = db.list_samples(&SampleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].sample, original);
    }

    #[tokio::test]
    async fn record_upload_finished_sets_key_and_stamp() {
        let (_tmp, db) = open_db().await;
        let upload_id = UploadId::new();
        db.create_sample(&upload_id).await.unwrap();

        let sample = db
            .record_upload_finished(&upload_id, "abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.file_name.as_deref(), Some("abc123"));
        assert!(sample.finished_upload_at.is_some());
        assert_eq!(sample.status, SampleStatus::Uploading);
    }

    #[tokio::test]
    async fn record_upload_finished_keeps_the_first_key() {
        let (_tmp, db) = open_db().await;
        let upload_id = UploadId::new();
        db.create_sample(&upload_id).await.unwrap();
        let first = db
            .record_upload_finished(&upload_id, "first")
            .await
            .unwrap()
            .unwrap();

        let refused = db.record_upload_finished(&upload_id, "second").await.unwrap();
        assert!(refused.is_none());

        let again = db
            .record_upload_finished(&upload_id, "first")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.file_name.as_deref(), Some("first"));
        assert_eq!(again.finished_upload_at, first.finished_upload_at);
    }

    #[tokio::test]
    async fn record_upload_finished_refuses_a_sample_past_uploading() {
        let (_tmp, db) = open_db().await;
        let upload_id = UploadId::new();
        let sample = db.create_sample(&upload_id).await.unwrap();
        db.transition_sample(&sample.id, SampleStatus::Uploading, SampleStatus::Parsing)
            .await
            .unwrap();

        let refused = db.record_upload_finished(&upload_id, "late").await.unwrap();
        assert!(refused.is_none());
        let sample = db.get_sample(&sample.id).await.unwrap().unwrap();
        assert_eq!(sample.file_name, None);
        assert_eq!(sample.status, SampleStatus::Parsing);
    }

    #[tokio::test]
    async fn record_upload_finished_for_unknown_upload() {
        let (_tmp, db) = open_db().await;
        let err = db
            .record_upload_finished(&UploadId::new(), "abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let (_tmp, db) = open_db().await;
        let sample = db.create_sample(&UploadId::new()).await.unwrap();

        db.transition_sample(&sample.id, SampleStatus::Uploading, SampleStatus::Parsing)
            .await
            .unwrap();

        // A second run racing on the same edge loses.
        let err = db
            .transition_sample(&sample.id, SampleStatus::Uploading, SampleStatus::Parsing)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));

        let stored = db.get_sample(&sample.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SampleStatus::Parsing);
    }

    #[tokio::test]
    async fn illegal_edges_are_rejected() {
        let (_tmp, db) = open_db().await;
        let sample = db.create_sample(&UploadId::new()).await.unwrap();

        let err = db
            .transition_sample(&sample.id, SampleStatus::Uploading, SampleStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidState(_)));
    }

    #[tokio::test]
    async fn transition_of_unknown_sample_is_not_found() {
        let (_tmp, db) = open_db().await;
        let err = db
            .transition_sample(&SampleId::new(), SampleStatus::Uploading, SampleStatus::Parsing)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn parsing_failure_records_message() {
        let (_tmp, db) = open_db().await;
        let sample = db.create_sample(&UploadId::new()).await.unwrap();
        db.transition_sample(&sample.id, SampleStatus::Uploading, SampleStatus::Parsing)
            .await
            .unwrap();

        db.fail_sample_parsing(&sample.id, "row 3: invalid digit")
            .await
            .unwrap();

        let stored = db.get_sample(&sample.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SampleStatus::Failed);
        assert_eq!(stored.parsing_error.as_deref(), Some("row 3: invalid digit"));

        // Failed is absorbing.
        assert!(db
            .transition_sample(&sample.id, SampleStatus::Failed, SampleStatus::Parsing)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let (_tmp, db) = open_db().await;
        let mut uploads = Vec::new();
        for _ in 0..3 {
            let upload_id = UploadId::new();
            db.create_sample(&upload_id).await.unwrap();
            uploads.push(upload_id);
        }

        let all = db.list_samples(&SampleFilter::default()).await.unwrap();
        let order: Vec<_> = all.iter().map(|d| d.sample.upload_id.clone()).collect();
        assert_eq!(order, uploads);

        let page = db
            .list_samples(&SampleFilter {
                skip: 1,
                limit: Some(1),
                ..SampleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sample.upload_id, uploads[1]);

        let one = db
            .list_samples(&SampleFilter {
                upload_id: Some(uploads[2].clone()),
                ..SampleFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].sample.upload_id, uploads[2]);
        assert!(one[0].summary_statistics.is_none());
        assert!(one[0].visualization.is_none());
    }
}
