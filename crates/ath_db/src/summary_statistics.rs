//! Statistics reports.

use crate::error::{DbError, Result};
use crate::samples::{advance_status, decode_id, log_transition};
use crate::types::*;
use crate::AthDb;
use ath_ids::{SampleId, SummaryStatisticsId};
use ath_protocol::{Report, SampleStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl AthDb {
    /// Store the report of a sample and move it `processing -> rendering`, in
    /// one transaction.
    pub async fn store_report(&self, sample_id: &SampleId, report: &Report) -> Result<SummaryStatistics> {
        let id = SummaryStatisticsId::new();
        let json = serde_json::to_string(report)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO summary_statistics (id, sample_id, report, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(sample_id.as_str())
        .bind(&json)
        .bind(Self::now_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DbError::from_insert(e, || format!("Sample {} already has a report", sample_id))
        })?;

        advance_status(
            &mut *tx,
            sample_id,
            SampleStatus::Processing,
            SampleStatus::Rendering,
            None,
        )
        .await?;
        tx.commit().await?;

        log_transition(sample_id, SampleStatus::Processing, SampleStatus::Rendering);

        self.get_summary_statistics(sample_id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Report for sample {}", sample_id)))
    }

    pub async fn get_summary_statistics(
        &self,
        sample_id: &SampleId,
    ) -> Result<Option<SummaryStatistics>> {
        let row = sqlx::query("SELECT * FROM summary_statistics WHERE sample_id = ?")
            .bind(sample_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_summary_statistics).transpose()
    }
}

fn row_to_summary_statistics(row: &SqliteRow) -> Result<SummaryStatistics> {
    let id: String = row.get("id");
    let sample_id: String = row.get("sample_id");
    let report: String = row.get("report");

    Ok(SummaryStatistics {
        id: decode_id(&id)?,
        sample_id: decode_id(&sample_id)?,
        report: serde_json::from_str(&report)?,
        created_at: AthDb::millis_to_datetime(row.get("created_at")),
    })
}
