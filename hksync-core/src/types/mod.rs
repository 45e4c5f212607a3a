pub mod anchor;
pub mod batch;
pub mod kind;
pub mod mode;
pub mod progress;
pub mod sample;

pub use anchor::QueryAnchor;
pub use batch::PendingSampleBatch;
pub use kind::{PipelineKey, SampleKind, StoreTypeHandle};
pub use mode::{AppPhase, StopReason, SyncMode};
pub use progress::{days_between, GlobalProgress, UploadProgress};
pub use sample::{DeletedSample, HealthSample, SampleDateRange, SampleSource, WorkoutDetail};
