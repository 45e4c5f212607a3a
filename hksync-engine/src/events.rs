//! Event types flowing through the engine loop and out to subscribers.

use chrono::{DateTime, Utc};

use hksync_core::errors::SyncResult;
use hksync_core::traits::AnchoredFetch;
use hksync_core::types::{
    AppPhase, HealthSample, PipelineKey, SampleKind, StopReason, StoreTypeHandle, SyncMode,
};

/// Requests from the app, serialized onto the engine loop.
#[derive(Debug)]
pub enum EngineCommand {
    /// Turn the upload interface on for a signed-in user. Switching users
    /// wipes all pipeline state first.
    EnableInterface {
        user_id: String,
        user_name: Option<String>,
    },
    /// Turn the interface off: stop every pipeline and clear sync state,
    /// keeping the user binding for a later re-enable.
    DisableInterface,
    /// Reconcile persisted interface state against the current sign-in;
    /// called once the app's service configuration is ready.
    Configure,
    /// Start every pipeline of one mode.
    StartUploading { mode: SyncMode },
    /// Stop every pipeline of one mode.
    StopUploading { mode: SyncMode, reason: StopReason },
    /// Restart pipelines that stopped somewhere they can pick up from.
    ResumeIfResumable,
    AppPhaseChanged(AppPhase),
    Shutdown,
}

/// What a completed read task brought back.
#[derive(Debug)]
pub enum FetchOutcome {
    Anchored(AnchoredFetch),
    Descending(Vec<HealthSample>),
}

/// Result of one POST-then-DELETE upload round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub posted: usize,
    pub deleted: usize,
    /// Records the service rejected and the round stripped before
    /// resubmitting.
    pub rejected: usize,
}

/// Everything the engine loop reacts to. Commands, store observations, and
/// completions of spawned read/probe/upload tasks all funnel through here,
/// so pipeline state is only ever touched from the loop.
#[derive(Debug)]
pub enum EngineEvent {
    Command(EngineCommand),
    /// The store reported changes for a handle.
    SamplesObserved(StoreTypeHandle),
    ReadCompleted {
        key: PipelineKey,
        /// Pipeline epoch at spawn time; stale completions are dropped.
        epoch: u64,
        result: SyncResult<FetchOutcome>,
    },
    /// Earliest/latest sample times discovered for a historical pipeline.
    ProbeCompleted {
        key: PipelineKey,
        epoch: u64,
        result: SyncResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)>,
    },
    UploadCompleted {
        key: PipelineKey,
        epoch: u64,
        result: SyncResult<UploadSummary>,
    },
}

/// Broadcast to app-side subscribers. Lagging subscribers lose the oldest
/// notifications, never the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotification {
    /// Progress counters for a pipeline changed; re-read them.
    StatsUpdated { key: PipelineKey },
    UploadingStarted { mode: SyncMode },
    /// A mode stopped. Never sent for externally forced stops.
    UploadingStopped { mode: SyncMode, reason: StopReason },
    /// A historical pipeline drained everything before its fence.
    HistoricalComplete { kind: SampleKind },
    /// The service returned 401; the app should refresh credentials.
    AuthRefreshRequested,
}
