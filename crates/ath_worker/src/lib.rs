//! Pipeline execution for uploaded samples.
//!
//! - [`dataset`]: CSV into a typed [`Table`]
//! - [`statistics`]: [`Table`] into a [`ath_protocol::Report`]
//! - [`render`]: the fixed chart battery and its publication
//! - [`pipeline`]: one sample through every stage, with status transitions
//! - [`worker`]: drains the durable job queue

pub mod blob_store;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod statistics;
pub mod worker;

pub use blob_store::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use dataset::{Row, Table};
pub use error::{BlobError, ParsingError, PipelineError, RenderError, StatisticsError};
pub use pipeline::{PipelineConfig, ProcessOutcome, SampleProcessor};
pub use render::{Artifact, RenderedArtifact, Renderer};
pub use worker::{Worker, WorkerConfig, WorkerHandle};
