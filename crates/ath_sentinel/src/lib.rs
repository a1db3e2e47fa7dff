//! Ingestion side of the Ath pipeline.
//!
//! [`WebhookIngestor`] turns upload gateway hooks into samples and hands
//! finished uploads to the [`JobDispatcher`], which queues a pipeline run for
//! the workers and returns immediately.

pub mod dispatch;
pub mod error;
pub mod ingest;

pub use dispatch::JobDispatcher;
pub use error::{IngestError, Result};
pub use ingest::{IngestOutcome, WebhookIngestor};
