//! # hksync-core
//!
//! Foundation crate for the hksync upload pipeline.
//! Defines all types, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod traits;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::UploaderConfig;
pub use errors::{SyncError, SyncResult};
pub use types::{
    DeletedSample, HealthSample, PipelineKey, QueryAnchor, SampleKind, StopReason, SyncMode,
};
