//! Per-pipeline sample reader: plans store queries, buffers results, and
//! tracks the durable cursor (anchor or descending fence) for resume.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use hksync_core::constants::MAX_BATCH_SIZE;
use hksync_core::errors::SyncResult;
use hksync_core::types::{
    days_between, DeletedSample, HealthSample, PendingSampleBatch, PipelineKey, QueryAnchor,
    SampleDateRange, StopReason, StoreTypeHandle, SyncMode,
};
use hksync_settings::{DateField, GlobalDateField, SettingsStore};

/// The next store query the engine should run for a pipeline.
#[derive(Debug, Clone)]
pub enum ReadPlan {
    /// Anchored incremental page (`Current`).
    Anchored {
        handle: StoreTypeHandle,
        start: DateTime<Utc>,
        anchor: Option<QueryAnchor>,
        limit: usize,
    },
    /// Descending page strictly before `before` (`HistoricalAll`).
    Descending {
        handle: StoreTypeHandle,
        before: DateTime<Utc>,
        limit: usize,
    },
    /// First-ever historical run: discover the full sample date range.
    RangeProbe { handle: StoreTypeHandle },
    /// Historical bounds consumed; nothing left to query.
    Exhausted,
}

pub struct SampleReader {
    key: PipelineKey,
    settings: Arc<SettingsStore>,
    batch: PendingSampleBatch,
    is_reading: bool,
    /// Anchor returned by the last fetch; durable only after promotion.
    staged_anchor: Option<QueryAnchor>,
    /// Set when a historical page came back short of the page size.
    exhausted: bool,
}

impl SampleReader {
    pub fn new(key: PipelineKey, settings: Arc<SettingsStore>) -> Self {
        Self {
            key,
            settings,
            batch: PendingSampleBatch::new(),
            is_reading: false,
            staged_anchor: None,
            exhausted: false,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.is_reading
    }

    /// Begin a read cycle. Returns false (and does nothing) if one is
    /// already running.
    pub fn start_reading(&mut self) -> bool {
        if self.is_reading {
            return false;
        }
        self.is_reading = true;
        self.exhausted = false;
        debug!(pipeline = %self.key, "reader: started");
        true
    }

    /// End the read cycle, dropping unconfirmed buffer and staged anchor.
    /// Unpromoted work resurfaces on the next cycle.
    pub fn stop_reading(&mut self, reason: &StopReason) {
        self.is_reading = false;
        self.batch.clear();
        self.staged_anchor = None;
        self.exhausted = false;
        debug!(pipeline = %self.key, reason = %reason, "reader: stopped");
    }

    /// Decide the next query from persisted cursor state and the buffer.
    pub fn plan_read(&self) -> SyncResult<ReadPlan> {
        let handle = self.key.kind.store_type_handle();
        match self.key.mode {
            SyncMode::Current => {
                let start = match self.settings.global_date(GlobalDateField::CurrentStart)? {
                    Some(start) => start,
                    None => {
                        warn!(pipeline = %self.key, "reader: no current-start fence; using now");
                        Utc::now()
                    }
                };
                Ok(ReadPlan::Anchored {
                    handle,
                    start,
                    anchor: self.settings.anchor(self.key)?,
                    limit: MAX_BATCH_SIZE,
                })
            }
            SyncMode::HistoricalAll => {
                // Buffered leftovers bound the next page below themselves.
                if let Some(oldest) = self.batch.oldest_buffered_time() {
                    return Ok(ReadPlan::Descending {
                        handle,
                        before: oldest,
                        limit: MAX_BATCH_SIZE,
                    });
                }
                let start = self.settings.date(self.key, DateField::QueryStart)?;
                let end = self.settings.date(self.key, DateField::QueryEnd)?;
                match (start, end) {
                    (Some(start), Some(end)) if start < end => Ok(ReadPlan::Descending {
                        handle,
                        before: end,
                        limit: MAX_BATCH_SIZE,
                    }),
                    (Some(_), Some(_)) => Ok(ReadPlan::Exhausted),
                    _ => Ok(ReadPlan::RangeProbe { handle }),
                }
            }
        }
    }

    /// Persist the discovered historical range, capped at the global fence.
    /// Returns the backfill span in whole days (zero when the fence already
    /// covers everything).
    pub fn record_range_probe(
        &mut self,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
        fence: DateTime<Utc>,
    ) -> SyncResult<i64> {
        // The top bound is exclusive; pad the discovered latest so its own
        // sample is still fetched.
        let top = (latest + Duration::seconds(1)).min(fence);
        self.settings
            .set_date(self.key, DateField::QueryStart, earliest)?;
        self.settings.set_date(self.key, DateField::QueryEnd, top)?;
        let span = days_between(earliest, top).max(0);
        debug!(
            pipeline = %self.key,
            earliest = %earliest,
            top = %top,
            span,
            "reader: historical range recorded"
        );
        Ok(span)
    }

    /// Buffer an anchored page. The anchor stays staged until the batch is
    /// confirmed uploaded.
    pub fn ingest_anchored(
        &mut self,
        samples: Vec<HealthSample>,
        deletes: Vec<DeletedSample>,
        anchor: QueryAnchor,
    ) {
        self.batch.ingest(samples, deletes);
        self.staged_anchor = Some(anchor);
    }

    /// Stage an anchor with nothing to upload under it (page fully filtered).
    pub fn stage_anchor(&mut self, anchor: QueryAnchor) {
        self.staged_anchor = Some(anchor);
    }

    /// Buffer a descending page; a short page marks the backfill exhausted
    /// once the buffer drains.
    pub fn ingest_descending(&mut self, samples: Vec<HealthSample>, limit: usize) {
        if samples.len() < limit {
            self.exhausted = true;
        }
        self.batch.ingest(samples, Vec::new());
    }

    /// Whether a short historical page signaled the end of older data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pop up to `max` samples in the mode's processing order.
    pub fn pop_samples(&mut self, max: usize) -> Vec<HealthSample> {
        let mut popped = Vec::new();
        while popped.len() < max {
            match self.batch.pop_next(self.key.mode) {
                Some(sample) => popped.push(sample),
                None => break,
            }
        }
        popped
    }

    /// Pop up to `max` deletion markers in arrival order.
    pub fn pop_deletes(&mut self, max: usize) -> Vec<DeletedSample> {
        let mut popped = Vec::new();
        while popped.len() < max {
            match self.batch.pop_next_delete() {
                Some(marker) => popped.push(marker),
                None => break,
            }
        }
        popped
    }

    /// Sample-time bounds of everything popped since the last take.
    pub fn take_round_range(&mut self) -> Option<SampleDateRange> {
        self.batch.take_round_range()
    }

    pub fn buffered_sample_count(&self) -> usize {
        self.batch.sample_count()
    }

    pub fn buffered_delete_count(&self) -> usize {
        self.batch.delete_count()
    }

    /// Persist the staged anchor after the batch it covers is confirmed.
    pub fn promote_last_anchor(&mut self) -> SyncResult<()> {
        if let Some(anchor) = self.staged_anchor.take() {
            self.settings.set_anchor(self.key, &anchor)?;
            debug!(pipeline = %self.key, "reader: anchor promoted");
        }
        Ok(())
    }

    /// Rewind the descending fence to the earliest confirmed sample. The
    /// next page reads strictly before it.
    pub fn rewind_fence(&mut self, to: DateTime<Utc>) -> SyncResult<()> {
        self.settings.set_date(self.key, DateField::QueryEnd, to)?;
        debug!(pipeline = %self.key, fence = %to, "reader: fence rewound");
        Ok(())
    }

    /// Collapse the historical bounds so the pipeline reports non-resumable.
    pub fn mark_exhausted(&mut self) -> SyncResult<()> {
        if let Some(start) = self.settings.date(self.key, DateField::QueryStart)? {
            self.settings.set_date(self.key, DateField::QueryEnd, start)?;
        }
        Ok(())
    }

    /// `Current` always resumes; `HistoricalAll` only while its discovered
    /// earliest is still older than the global historical fence.
    pub fn is_resumable(&self) -> SyncResult<bool> {
        match self.key.mode {
            SyncMode::Current => Ok(true),
            SyncMode::HistoricalAll => {
                let earliest = self.settings.date(self.key, DateField::QueryStart)?;
                let fence = self.settings.global_date(GlobalDateField::HistoricalFence)?;
                match (earliest, fence) {
                    (Some(earliest), Some(fence)) => Ok(earliest < fence),
                    _ => Ok(false),
                }
            }
        }
    }

    /// Clear the durable cursor (anchor and discovered range) and all
    /// buffered state.
    pub fn reset_persistent_state(&mut self) -> SyncResult<()> {
        self.settings.reset_reader_state(self.key)?;
        self.batch.clear();
        self.staged_anchor = None;
        self.exhausted = false;
        Ok(())
    }
}
