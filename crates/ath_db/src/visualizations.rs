//! Visualizations and their plots.

use crate::error::{DbError, Result};
use crate::samples::{advance_status, decode_id, log_transition};
use crate::types::*;
use crate::AthDb;
use ath_ids::{PlotId, SampleId, VisualizationId};
use ath_protocol::{PlotDescriptor, SampleStatus};
use sqlx::Row;

impl AthDb {
    /// Store a visualization with its plots (in the given order) and move the
    /// sample `rendering -> done`, in one transaction.
    pub async fn store_visualization(
        &self,
        sample_id: &SampleId,
        plots: &[PlotDescriptor],
    ) -> Result<Visualization> {
        let visualization_id = VisualizationId::new();

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO visualization (id, sample_id, created_at) VALUES (?, ?, ?)")
            .bind(visualization_id.as_str())
            .bind(sample_id.as_str())
            .bind(Self::now_millis())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DbError::from_insert(e, || {
                    format!("Sample {} already has a visualization", sample_id)
                })
            })?;

        for (position, plot) in plots.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO plot (id, visualization_id, position, name, file_name, url)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(PlotId::new().as_str())
            .bind(visualization_id.as_str())
            .bind(position as i64)
            .bind(&plot.name)
            .bind(&plot.file_name)
            .bind(&plot.url)
            .execute(&mut *tx)
            .await?;
        }

        advance_status(
            &mut *tx,
            sample_id,
            SampleStatus::Rendering,
            SampleStatus::Done,
            None,
        )
        .await?;
        tx.commit().await?;

        log_transition(sample_id, SampleStatus::Rendering, SampleStatus::Done);

        self.get_visualization(sample_id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("Visualization for sample {}", sample_id)))
    }

    pub async fn get_visualization(&self, sample_id: &SampleId) -> Result<Option<Visualization>> {
        let row = sqlx::query("SELECT * FROM visualization WHERE sample_id = ?")
            .bind(sample_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.get("id");
        let visualization_id: VisualizationId = decode_id(&id)?;

        let plot_rows =
            sqlx::query("SELECT * FROM plot WHERE visualization_id = ? ORDER BY position ASC")
                .bind(visualization_id.as_str())
                .fetch_all(&self.pool)
                .await?;

        let mut plots = Vec::with_capacity(plot_rows.len());
        for plot_row in &plot_rows {
            let plot_id: String = plot_row.get("id");
            plots.push(Plot {
                id: decode_id(&plot_id)?,
                visualization_id: visualization_id.clone(),
                position: plot_row.get("position"),
                name: plot_row.get("name"),
                file_name: plot_row.get("file_name"),
                url: plot_row.get("url"),
            });
        }

        Ok(Some(Visualization {
            id: visualization_id,
            sample_id: sample_id.clone(),
            plots,
            created_at: AthDb::millis_to_datetime(row.get("created_at")),
        }))
    }
}
