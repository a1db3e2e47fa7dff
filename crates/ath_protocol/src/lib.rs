//! Shared types for the Ath sample pipeline.
//!
//! Everything that crosses a crate boundary lives here: the sample lifecycle,
//! the statistics report, upload gateway hook payloads, configuration and the
//! artifact naming scheme.

pub mod config;
pub mod defaults;
pub mod hooks;
pub mod naming;
pub mod paths;
pub mod types;

pub use ath_ids::{PlotId, SampleId, SummaryStatisticsId, UploadId, VisualizationId};
pub use config::{AthConfig, ConfigError, StoreConfig};
pub use hooks::{HookBody, HookError, HookName, Storage, UploadEvent};
pub use naming::{object_url, plot_key};
pub use types::{
    DateInterval, GroupStats, NumMissingValues, PlotDescriptor, RenderingFormat, Report,
    SampleStatus, TimesScalar,
};
