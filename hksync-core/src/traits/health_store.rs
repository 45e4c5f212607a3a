use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::errors::SyncResult;
use crate::types::{DeletedSample, HealthSample, QueryAnchor, StoreTypeHandle};

/// One page of results from an anchored incremental query.
#[derive(Debug, Clone)]
pub struct AnchoredFetch {
    /// New samples since the anchor, capped at the requested limit.
    pub added: Vec<HealthSample>,
    /// Samples deleted from the store since the anchor.
    pub deleted: Vec<DeletedSample>,
    /// Cursor covering everything in this page.
    pub anchor: QueryAnchor,
}

impl AnchoredFetch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// On-device health store: incremental queries, range queries, observation.
///
/// Callbacks never run on the caller's context; observation events are
/// delivered over the supplied channel and re-marshaled by the engine loop.
pub trait HealthStore: Send + Sync {
    // --- Incremental ---
    /// Samples with start time at or after `start`, newer than `anchor`,
    /// capped at `limit`. A `None` anchor reads from the beginning.
    fn anchored_fetch(
        &self,
        handle: StoreTypeHandle,
        start: DateTime<Utc>,
        anchor: Option<&QueryAnchor>,
        limit: usize,
    ) -> SyncResult<AnchoredFetch>;

    // --- Historical ---
    /// Samples with start time strictly before `before`, newest first,
    /// capped at `limit`.
    fn fetch_descending(
        &self,
        handle: StoreTypeHandle,
        before: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<HealthSample>>;

    // --- Range probes ---
    /// Earliest sample start time on record, if any.
    fn earliest_sample_time(&self, handle: StoreTypeHandle) -> SyncResult<Option<DateTime<Utc>>>;
    /// Latest sample start time on record, if any.
    fn latest_sample_time(&self, handle: StoreTypeHandle) -> SyncResult<Option<DateTime<Utc>>>;

    // --- Observation ---
    /// Subscribe to change notifications; each event names the handle that
    /// changed. At most one subscription per handle.
    fn start_observing(
        &self,
        handle: StoreTypeHandle,
        events: UnboundedSender<StoreTypeHandle>,
    ) -> SyncResult<()>;
    fn stop_observing(&self, handle: StoreTypeHandle) -> SyncResult<()>;

    // --- Background delivery ---
    fn enable_background_delivery(&self, handle: StoreTypeHandle) -> SyncResult<()>;
    fn disable_background_delivery(&self, handle: StoreTypeHandle) -> SyncResult<()>;
}
