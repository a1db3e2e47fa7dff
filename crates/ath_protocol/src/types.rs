//! Canonical value types shared by the store, the pipeline and the CLI.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Sample lifecycle
// ============================================================================

/// Processing status of a sample.
///
/// ```text
/// UPLOADING -> PARSING -> PROCESSING -> RENDERING -> DONE
///                 |
///                 +-----> FAILED
/// ```
///
/// `DONE` and `FAILED` are absorbing. This is the CANONICAL definition; the
/// `sample.status` column stores [`SampleStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStatus {
    /// Registered by the upload gateway, bytes still arriving
    Uploading,
    /// Pipeline is reading the dataset
    Parsing,
    /// Dataset parsed, statistics being computed
    Processing,
    /// Statistics stored, charts being rendered
    Rendering,
    /// Charts stored
    Done,
    /// Dataset could not be parsed
    Failed,
}

impl SampleStatus {
    pub const ALL: [SampleStatus; 6] = [
        SampleStatus::Uploading,
        SampleStatus::Parsing,
        SampleStatus::Processing,
        SampleStatus::Rendering,
        SampleStatus::Done,
        SampleStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Uploading => "uploading",
            SampleStatus::Parsing => "parsing",
            SampleStatus::Processing => "processing",
            SampleStatus::Rendering => "rendering",
            SampleStatus::Done => "done",
            SampleStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SampleStatus::Done | SampleStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: SampleStatus) -> bool {
        matches!(
            (self, next),
            (SampleStatus::Uploading, SampleStatus::Parsing)
                | (SampleStatus::Parsing, SampleStatus::Processing)
                | (SampleStatus::Parsing, SampleStatus::Failed)
                | (SampleStatus::Processing, SampleStatus::Rendering)
                | (SampleStatus::Rendering, SampleStatus::Done)
        )
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SampleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uploading" => Ok(SampleStatus::Uploading),
            "parsing" => Ok(SampleStatus::Parsing),
            "processing" => Ok(SampleStatus::Processing),
            "rendering" => Ok(SampleStatus::Rendering),
            "done" => Ok(SampleStatus::Done),
            "failed" => Ok(SampleStatus::Failed),
            _ => Err(format!("Invalid sample status: '{}'", s)),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// Encoding used for rendered charts. Also the file suffix of published plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderingFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl RenderingFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RenderingFormat::Png => "png",
            RenderingFormat::Svg => "svg",
            RenderingFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for RenderingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for RenderingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(RenderingFormat::Png),
            "svg" => Ok(RenderingFormat::Svg),
            "pdf" => Ok(RenderingFormat::Pdf),
            _ => Err(format!(
                "Invalid rendering format: '{}' (expected png, svg or pdf)",
                s
            )),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// One value per time column. `total_time` is `review_time + merge_time` per row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimesScalar {
    pub review_time: f64,
    pub merge_time: f64,
    pub total_time: f64,
}

/// Mean / mode / median / count over a group of rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub mean: TimesScalar,
    pub mode: TimesScalar,
    pub median: TimesScalar,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

/// Missing (empty) cells per required column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumMissingValues {
    pub review_time: u64,
    pub merge_time: u64,
    pub date: u64,
    pub team: u64,
}

/// Statistical summary of one sample.
///
/// Field names and nesting are consumed by downstream display; keep them stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total_num_observations: u64,
    /// Distinct team labels in order of first appearance.
    pub teams: Vec<String>,
    pub date_interval: DateInterval,
    pub stats: GroupStats,
    pub per_team: BTreeMap<String, GroupStats>,
    pub num_prs_without_review: u64,
    pub num_prs_without_ci: u64,
    pub num_missing_values: NumMissingValues,
}

/// One published chart: its artifact name, storage key and public URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotDescriptor {
    pub name: String,
    pub file_name: String,
    pub url: String,
}
