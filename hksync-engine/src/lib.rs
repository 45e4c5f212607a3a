//! # hksync-engine
//!
//! Health-store upload engine: per-(kind, mode) pipelines that read samples
//! incrementally, transform them to service records, and upload them with
//! at-least-once delivery. `Current` pipelines follow anchored queries and
//! store observations forward; `HistoricalAll` pipelines backfill older data
//! newest-first behind a shared fence.
//!
//! [`engine`] holds the `SyncEngine` handle and the single-task event loop;
//! [`reader`], [`uploader`], and [`stats`] are the per-pipeline components it
//! drives. [`transform`] converts samples to service records, [`transport`]
//! talks to the ingestion service, and [`events`] carries the command and
//! notification types between them.

pub mod engine;
pub mod events;
pub mod reader;
pub mod stats;
pub mod transform;
pub mod transport;
pub mod uploader;

pub use engine::SyncEngine;
pub use events::{EngineCommand, SyncNotification, UploadSummary};
pub use reader::{ReadPlan, SampleReader};
pub use stats::UploadStatsTracker;
pub use transform::SampleTransform;
pub use transport::HttpTransport;
pub use uploader::SampleUploader;
