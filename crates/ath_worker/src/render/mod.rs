//! Chart renderer: eight fixed charts per dataset, encoded in one format.
//!
//! Charts are built as SVG documents and then encoded (PNG via resvg, PDF via
//! svg2pdf, or the SVG text itself). Rendering is pure CPU work; callers run
//! it on a blocking thread.

mod bar;
mod chart;
mod encode;
mod pie;
mod violin;

use ath_protocol::{plot_key, PlotDescriptor, RenderingFormat};
use tracing::debug;

use crate::blob_store::BlobStore;
use crate::dataset::Table;
use crate::error::{BlobError, RenderError};
use violin::TimeColumn;

const NO_OUTLIERS_SUFFIX: &str = "\nexcluding unreviewed and non-CI PRs";

/// The charts produced for every sample, in publication order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    MeanTimeWithOutliers,
    MeanTimeNoOutliers,
    PrsByTeamWithOutliers,
    PrsByTeamNoOutliers,
    ReviewTimeWithOutliers,
    MergeTimeWithOutliers,
    ReviewTimeNoOutliers,
    MergeTimeNoOutliers,
}

impl Artifact {
    pub const ALL: [Artifact; 8] = [
        Artifact::MeanTimeWithOutliers,
        Artifact::MeanTimeNoOutliers,
        Artifact::PrsByTeamWithOutliers,
        Artifact::PrsByTeamNoOutliers,
        Artifact::ReviewTimeWithOutliers,
        Artifact::MergeTimeWithOutliers,
        Artifact::ReviewTimeNoOutliers,
        Artifact::MergeTimeNoOutliers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Artifact::MeanTimeWithOutliers => "mean_time_with_outliers_stacked_bar_plot",
            Artifact::MeanTimeNoOutliers => "mean_time_no_outliers_stacked_bar_plot",
            Artifact::PrsByTeamWithOutliers => "num_prs_by_team_with_outliers_pie_chart_plot",
            Artifact::PrsByTeamNoOutliers => "num_prs_by_team_no_outliers_pie_chart_plot",
            Artifact::ReviewTimeWithOutliers => "review_time_distribution_with_outliers_violin_plot",
            Artifact::MergeTimeWithOutliers => "merge_time_distribution_with_outliers_violin_plot",
            Artifact::ReviewTimeNoOutliers => "review_time_distribution_no_outliers_violin_plot",
            Artifact::MergeTimeNoOutliers => "merge_time_distribution_no_outliers_violin_plot",
        }
    }

    pub fn includes_outliers(&self) -> bool {
        matches!(
            self,
            Artifact::MeanTimeWithOutliers
                | Artifact::PrsByTeamWithOutliers
                | Artifact::ReviewTimeWithOutliers
                | Artifact::MergeTimeWithOutliers
        )
    }

    fn title(&self) -> String {
        let base = match self {
            Artifact::MeanTimeWithOutliers | Artifact::MeanTimeNoOutliers => {
                "Mean review and merge time by team"
            }
            Artifact::PrsByTeamWithOutliers | Artifact::PrsByTeamNoOutliers => {
                "Number of PRs by team"
            }
            Artifact::ReviewTimeWithOutliers | Artifact::ReviewTimeNoOutliers => {
                "Review time distribution by team"
            }
            Artifact::MergeTimeWithOutliers | Artifact::MergeTimeNoOutliers => {
                "Merge time distribution by team"
            }
        };
        if self.includes_outliers() {
            base.to_string()
        } else {
            format!("{}{}", base, NO_OUTLIERS_SUFFIX)
        }
    }

    /// SVG source of this chart for `table`, which must already be the
    /// subset the chart describes.
    fn draw(&self, table: &Table) -> String {
        let title = self.title();
        match self {
            Artifact::MeanTimeWithOutliers | Artifact::MeanTimeNoOutliers => {
                bar::mean_time_by_team(table, &title)
            }
            Artifact::PrsByTeamWithOutliers | Artifact::PrsByTeamNoOutliers => {
                pie::prs_by_team(table, &title)
            }
            Artifact::ReviewTimeWithOutliers | Artifact::ReviewTimeNoOutliers => {
                violin::distribution_by_team(table, TimeColumn::Review, &title)
            }
            Artifact::MergeTimeWithOutliers | Artifact::MergeTimeNoOutliers => {
                violin::distribution_by_team(table, TimeColumn::Merge, &title)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub name: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer {
    format: RenderingFormat,
}

impl Renderer {
    pub fn new(format: RenderingFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> RenderingFormat {
        self.format
    }

    /// All eight charts, in [`Artifact::ALL`] order.
    pub fn render(&self, table: &Table) -> Result<Vec<RenderedArtifact>, RenderError> {
        let clean = table.without_outliers();
        debug!(
            rows = table.len(),
            clean_rows = clean.len(),
            format = %self.format,
            "Rendering charts"
        );

        Artifact::ALL
            .iter()
            .map(|artifact| {
                let subset = if artifact.includes_outliers() { table } else { &clean };
                let svg = artifact.draw(subset);
                Ok(RenderedArtifact {
                    name: artifact.name(),
                    bytes: encode::encode(&svg, self.format)?,
                })
            })
            .collect()
    }
}

/// Upload rendered charts and describe where they went, in input order.
pub fn publish(
    artifacts: &[RenderedArtifact],
    sample_file_name: &str,
    format: RenderingFormat,
    store: &dyn BlobStore,
    plots_bucket: &str,
) -> Result<Vec<PlotDescriptor>, BlobError> {
    artifacts
        .iter()
        .map(|artifact| {
            let key = plot_key(sample_file_name, artifact.name, format);
            let url = store.put(plots_bucket, &key, &artifact.bytes)?;
            Ok(PlotDescriptor {
                name: artifact.name.to_string(),
                file_name: key,
                url,
            })
        })
        .collect()
}
