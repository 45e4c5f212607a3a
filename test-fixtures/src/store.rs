//! In-memory health store double with anchored-query semantics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use hksync_core::errors::{StoreError, SyncResult};
use hksync_core::traits::{AnchoredFetch, HealthStore};
use hksync_core::types::{DeletedSample, HealthSample, QueryAnchor, SampleKind, StoreTypeHandle};

struct Stored {
    seq: u64,
    sample: HealthSample,
}

/// Scriptable stand-in for the on-device store.
///
/// Every mutation gets a monotonic sequence number; anchors are the decimal
/// sequence covered so far, so incremental fetches page through adds and
/// deletes in mutation order exactly once.
#[derive(Default)]
pub struct MockHealthStore {
    shelves: DashMap<&'static str, Vec<Stored>>,
    deletions: DashMap<&'static str, Vec<(u64, DeletedSample)>>,
    observers: DashMap<&'static str, UnboundedSender<StoreTypeHandle>>,
    background: DashMap<&'static str, bool>,
    seq: AtomicU64,
    fail_queue: Mutex<VecDeque<String>>,
}

impl MockHealthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Shelve a sample under the kind's store type. Returns its id.
    pub fn add_sample(&self, kind: SampleKind, sample: HealthSample) -> Uuid {
        let id = sample.id;
        let seq = self.next_seq();
        self.shelves
            .entry(kind.store_type_handle().0)
            .or_default()
            .push(Stored { seq, sample });
        id
    }

    pub fn add_samples(&self, kind: SampleKind, samples: Vec<HealthSample>) {
        for sample in samples {
            self.add_sample(kind, sample);
        }
    }

    /// Remove a shelved sample and record a deletion marker for it.
    pub fn delete_sample(&self, kind: SampleKind, id: Uuid) {
        let handle = kind.store_type_handle().0;
        if let Some(mut shelf) = self.shelves.get_mut(handle) {
            shelf.retain(|stored| stored.sample.id != id);
        }
        let seq = self.next_seq();
        self.deletions
            .entry(handle)
            .or_default()
            .push((seq, DeletedSample { id }));
    }

    /// Deliver an observation event for the kind, if anyone subscribed.
    /// Returns whether the event went out.
    pub fn notify(&self, kind: SampleKind) -> bool {
        let handle = kind.store_type_handle();
        match self.observers.get(handle.0) {
            Some(sender) => sender.send(handle).is_ok(),
            None => false,
        }
    }

    /// Fail the next fetch (anchored or descending) with this message.
    pub fn fail_next_fetch(&self, message: &str) {
        self.fail_queue
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    pub fn is_observing(&self, kind: SampleKind) -> bool {
        self.observers.contains_key(kind.store_type_handle().0)
    }

    pub fn background_enabled(&self, kind: SampleKind) -> bool {
        self.background
            .get(kind.store_type_handle().0)
            .map(|on| *on)
            .unwrap_or(false)
    }

    pub fn sample_count(&self, kind: SampleKind) -> usize {
        self.shelves
            .get(kind.store_type_handle().0)
            .map(|shelf| shelf.len())
            .unwrap_or(0)
    }

    fn take_scripted_failure(&self) -> Option<String> {
        self.fail_queue.lock().unwrap().pop_front()
    }

    fn parse_anchor(anchor: Option<&QueryAnchor>) -> SyncResult<u64> {
        match anchor {
            None => Ok(0),
            Some(anchor) => anchor.as_str().parse::<u64>().map_err(|_| {
                StoreError::QueryFailed {
                    type_name: "anchor".to_string(),
                    message: format!("unparseable anchor {anchor}"),
                }
                .into()
            }),
        }
    }
}

enum Change {
    Added(HealthSample),
    Deleted(DeletedSample),
}

impl HealthStore for MockHealthStore {
    fn anchored_fetch(
        &self,
        handle: StoreTypeHandle,
        start: DateTime<Utc>,
        anchor: Option<&QueryAnchor>,
        limit: usize,
    ) -> SyncResult<AnchoredFetch> {
        if let Some(message) = self.take_scripted_failure() {
            return Err(StoreError::QueryFailed {
                type_name: handle.0.to_string(),
                message,
            }
            .into());
        }
        let watermark = Self::parse_anchor(anchor)?;

        // Replay adds and deletes newer than the watermark in mutation order.
        let mut changes: Vec<(u64, Change)> = Vec::new();
        if let Some(shelf) = self.shelves.get(handle.0) {
            for stored in shelf.iter().filter(|s| s.seq > watermark) {
                changes.push((stored.seq, Change::Added(stored.sample.clone())));
            }
        }
        if let Some(markers) = self.deletions.get(handle.0) {
            for (seq, marker) in markers.iter().filter(|(seq, _)| *seq > watermark) {
                changes.push((*seq, Change::Deleted(*marker)));
            }
        }
        changes.sort_by_key(|(seq, _)| *seq);

        let mut added = Vec::new();
        let mut deleted = Vec::new();
        let mut covered = watermark;
        for (seq, change) in changes {
            if added.len() + deleted.len() >= limit {
                break;
            }
            covered = seq;
            match change {
                Change::Added(sample) if sample.start >= start => added.push(sample),
                Change::Added(_) => {}
                Change::Deleted(marker) => deleted.push(marker),
            }
        }

        Ok(AnchoredFetch {
            added,
            deleted,
            anchor: QueryAnchor::new(covered.to_string()),
        })
    }

    fn fetch_descending(
        &self,
        handle: StoreTypeHandle,
        before: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<HealthSample>> {
        if let Some(message) = self.take_scripted_failure() {
            return Err(StoreError::QueryFailed {
                type_name: handle.0.to_string(),
                message,
            }
            .into());
        }
        let mut page: Vec<HealthSample> = self
            .shelves
            .get(handle.0)
            .map(|shelf| {
                shelf
                    .iter()
                    .filter(|stored| stored.sample.start < before)
                    .map(|stored| stored.sample.clone())
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by(|a, b| b.start.cmp(&a.start));
        page.truncate(limit);
        Ok(page)
    }

    fn earliest_sample_time(&self, handle: StoreTypeHandle) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self
            .shelves
            .get(handle.0)
            .and_then(|shelf| shelf.iter().map(|stored| stored.sample.start).min()))
    }

    fn latest_sample_time(&self, handle: StoreTypeHandle) -> SyncResult<Option<DateTime<Utc>>> {
        Ok(self
            .shelves
            .get(handle.0)
            .and_then(|shelf| shelf.iter().map(|stored| stored.sample.start).max()))
    }

    fn start_observing(
        &self,
        handle: StoreTypeHandle,
        events: UnboundedSender<StoreTypeHandle>,
    ) -> SyncResult<()> {
        self.observers.insert(handle.0, events);
        Ok(())
    }

    fn stop_observing(&self, handle: StoreTypeHandle) -> SyncResult<()> {
        self.observers.remove(handle.0);
        Ok(())
    }

    fn enable_background_delivery(&self, handle: StoreTypeHandle) -> SyncResult<()> {
        self.background.insert(handle.0, true);
        Ok(())
    }

    fn disable_background_delivery(&self, handle: StoreTypeHandle) -> SyncResult<()> {
        self.background.insert(handle.0, false);
        Ok(())
    }
}
