use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::mode::SyncMode;
use super::sample::{DeletedSample, HealthSample, SampleDateRange};

/// Samples fetched but not yet uploaded, plus parallel deletion markers.
///
/// Samples are held sorted by start time ascending. `Current` consumes from
/// the oldest end and `HistoricalAll` from the newest, so pop order always
/// matches the mode's processing direction. The batch may retain unconsumed
/// samples across reads within one historical session; the oldest buffered
/// time then bounds the next descending query.
#[derive(Debug, Clone, Default)]
pub struct PendingSampleBatch {
    samples: VecDeque<HealthSample>,
    deletes: VecDeque<DeletedSample>,
    round_range: Option<SampleDateRange>,
}

impl PendingSampleBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a freshly read page into the buffer, keeping ascending order.
    pub fn ingest(&mut self, samples: Vec<HealthSample>, deletes: Vec<DeletedSample>) {
        let mut merged: Vec<HealthSample> = self.samples.drain(..).collect();
        merged.extend(samples);
        merged.sort_by_key(|s| s.start);
        self.samples = merged.into();
        self.deletes.extend(deletes);
    }

    /// Remove and return the next sample in the mode's processing order,
    /// folding its start time into the current round's range.
    pub fn pop_next(&mut self, mode: SyncMode) -> Option<HealthSample> {
        let sample = match mode {
            SyncMode::Current => self.samples.pop_front(),
            SyncMode::HistoricalAll => self.samples.pop_back(),
        }?;
        match &mut self.round_range {
            Some(range) => range.extend(sample.start),
            None => self.round_range = Some(SampleDateRange::new(sample.start, sample.start)),
        }
        Some(sample)
    }

    pub fn pop_next_delete(&mut self) -> Option<DeletedSample> {
        self.deletes.pop_front()
    }

    /// Start time of the sample the next pop would return.
    pub fn next_sample_time(&self, mode: SyncMode) -> Option<DateTime<Utc>> {
        match mode {
            SyncMode::Current => self.samples.front().map(|s| s.start),
            SyncMode::HistoricalAll => self.samples.back().map(|s| s.start),
        }
    }

    /// Oldest buffered start time; bounds the next descending read.
    pub fn oldest_buffered_time(&self) -> Option<DateTime<Utc>> {
        self.samples.front().map(|s| s.start)
    }

    /// Earliest/latest start times popped since the last take, then resets.
    pub fn take_round_range(&mut self) -> Option<SampleDateRange> {
        self.round_range.take()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.deletes.is_empty()
    }

    /// Drop everything, including round tracking.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.deletes.clear();
        self.round_range = None;
    }
}
