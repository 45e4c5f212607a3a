//! Write-through per-pipeline upload statistics.
//!
//! Every mutation lands in the settings store synchronously and mirrors into
//! memory, so a restarted process resumes showing the same progress.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use hksync_core::errors::SyncResult;
use hksync_core::types::{days_between, PipelineKey, SampleDateRange, SyncMode, UploadProgress};
use hksync_settings::{CountField, DateField, SettingsStore};

pub struct UploadStatsTracker {
    key: PipelineKey,
    settings: Arc<SettingsStore>,
    progress: UploadProgress,
    /// Sample-time bounds of the last attempt; promoted on success.
    attempt_range: Option<SampleDateRange>,
}

impl UploadStatsTracker {
    /// Build a tracker, reloading persisted progress for the pipeline.
    pub fn new(key: PipelineKey, settings: Arc<SettingsStore>) -> SyncResult<Self> {
        let mut tracker = Self {
            key,
            settings,
            progress: UploadProgress::default(),
            attempt_range: None,
        };
        tracker.reload()?;
        Ok(tracker)
    }

    pub fn progress(&self) -> &UploadProgress {
        &self.progress
    }

    fn reload(&mut self) -> SyncResult<()> {
        let key = self.key;
        let settings = &self.settings;
        self.progress = UploadProgress {
            total_upload_count: settings.count(key, CountField::TotalUploadCount)?,
            last_attempt_at: settings.date(key, DateField::LastAttemptAt)?,
            last_attempt_count: settings.count(key, CountField::LastAttemptCount)?,
            last_success_at: settings.date(key, DateField::LastSuccessAt)?,
            last_success_earliest: settings.date(key, DateField::LastSuccessEarliestSample)?,
            last_success_latest: settings.date(key, DateField::LastSuccessLatestSample)?,
            total_days: settings.count(key, CountField::TotalDaysHistorical)? as i64,
            current_day: settings.count(key, CountField::CurrentDayHistorical)? as i64,
        };
        let earliest = settings.date(key, DateField::LastAttemptEarliestSample)?;
        let latest = settings.date(key, DateField::LastAttemptLatestSample)?;
        self.attempt_range = match (earliest, latest) {
            (Some(earliest), Some(latest)) => Some(SampleDateRange::new(earliest, latest)),
            _ => None,
        };
        Ok(())
    }

    /// Record the shape of a batch about to be sent. A zero-count attempt
    /// (deletes only) records time and count but leaves the sample-time
    /// range untouched.
    pub fn record_attempt(
        &mut self,
        at: DateTime<Utc>,
        count: u64,
        range: Option<SampleDateRange>,
    ) -> SyncResult<()> {
        self.settings.set_date(self.key, DateField::LastAttemptAt, at)?;
        self.settings
            .set_count(self.key, CountField::LastAttemptCount, count)?;
        if let Some(range) = range {
            self.settings
                .set_date(self.key, DateField::LastAttemptEarliestSample, range.earliest)?;
            self.settings
                .set_date(self.key, DateField::LastAttemptLatestSample, range.latest)?;
            self.attempt_range = Some(range);
        }
        self.progress.last_attempt_at = Some(at);
        self.progress.last_attempt_count = count;
        debug!(pipeline = %self.key, count, "stats: upload attempt");
        Ok(())
    }

    /// Confirm the last attempt: fold its count into the cumulative total
    /// and promote its sample-time range. Delete-only successes don't move
    /// the sample-time cursor, so a zero-count attempt is a no-op here.
    pub fn record_success(&mut self, at: DateTime<Utc>) -> SyncResult<()> {
        if self.progress.last_attempt_count == 0 {
            debug!(pipeline = %self.key, "stats: delete-only success; counters unchanged");
            return Ok(());
        }

        let total = self.progress.total_upload_count + self.progress.last_attempt_count;
        self.settings
            .set_count(self.key, CountField::TotalUploadCount, total)?;
        self.settings.set_date(self.key, DateField::LastSuccessAt, at)?;
        self.progress.total_upload_count = total;
        self.progress.last_success_at = Some(at);

        if let Some(range) = self.attempt_range {
            self.settings
                .set_date(self.key, DateField::LastSuccessEarliestSample, range.earliest)?;
            self.settings
                .set_date(self.key, DateField::LastSuccessLatestSample, range.latest)?;
            self.progress.last_success_earliest = Some(range.earliest);
            self.progress.last_success_latest = Some(range.latest);
        }

        if self.key.mode == SyncMode::HistoricalAll {
            self.recompute_historical_day()?;
        }
        debug!(
            pipeline = %self.key,
            total = self.progress.total_upload_count,
            "stats: upload success"
        );
        Ok(())
    }

    /// Current day = whole days between the discovered range start and the
    /// most recently confirmed sample.
    fn recompute_historical_day(&mut self) -> SyncResult<()> {
        let range_start = self.settings.date(self.key, DateField::QueryStart)?;
        let (Some(start), Some(latest)) = (range_start, self.progress.last_success_latest) else {
            return Ok(());
        };
        let day = days_between(start, latest).max(0);
        self.settings
            .set_count(self.key, CountField::CurrentDayHistorical, day as u64)?;
        self.progress.current_day = day;
        Ok(())
    }

    /// Record the discovered backfill span in whole days.
    pub fn set_historical_span(&mut self, total_days: i64) -> SyncResult<()> {
        let total = total_days.max(0);
        self.settings
            .set_count(self.key, CountField::TotalDaysHistorical, total as u64)?;
        self.progress.total_days = total;
        Ok(())
    }

    /// A historical sync ran out of data: pin the indicator to 100% even if
    /// day truncation would leave a visible gap.
    pub fn record_historical_end_state(&mut self) -> SyncResult<()> {
        self.settings.set_count(
            self.key,
            CountField::CurrentDayHistorical,
            self.progress.total_days.max(0) as u64,
        )?;
        self.progress.current_day = self.progress.total_days;
        Ok(())
    }

    /// Drop every counter and timestamp for this pipeline.
    pub fn reset(&mut self) -> SyncResult<()> {
        self.settings.reset_stats(self.key)?;
        self.progress = UploadProgress::default();
        self.attempt_range = None;
        Ok(())
    }
}
