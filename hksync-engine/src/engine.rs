//! Sync engine: a single-task event loop owning one pipeline per
//! (kind, mode) pair.
//!
//! All pipeline state lives inside the loop task; the `SyncEngine` handle
//! only sends commands and reads durable state. Store queries and upload
//! rounds run on blocking tasks and report back as events, tagged with the
//! pipeline epoch at spawn time so completions that outlived a stop or
//! restart are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use hksync_core::config::UploaderConfig;
use hksync_core::constants::{MAX_BATCH_SIZE, UPLOADER_SCHEMA_VERSION};
use hksync_core::errors::{EngineError, SyncError, SyncResult, UploadError};
use hksync_core::traits::{
    AnchoredFetch, BackgroundTaskToken, HealthStore, ServiceConfig, UploadTransport,
};
use hksync_core::types::{
    days_between, AppPhase, GlobalProgress, HealthSample, PipelineKey, SampleKind, StopReason,
    StoreTypeHandle, SyncMode, UploadProgress,
};
use hksync_settings::{
    GlobalCountField, GlobalDateField, GlobalFlagField, GlobalStringField, SettingsStore,
};

use crate::events::{EngineCommand, EngineEvent, FetchOutcome, SyncNotification, UploadSummary};
use crate::reader::{ReadPlan, SampleReader};
use crate::stats::UploadStatsTracker;
use crate::transform::SampleTransform;
use crate::uploader::SampleUploader;

/// Handle to a running engine loop.
pub struct SyncEngine {
    events: UnboundedSender<EngineEvent>,
    notifications: broadcast::Sender<SyncNotification>,
    settings: Arc<SettingsStore>,
    task: JoinHandle<()>,
}

impl SyncEngine {
    /// Run schema migration, then spawn the engine loop and the observation
    /// bridge. The engine is idle until `configure` or `enable_interface`.
    pub fn spawn(
        config: UploaderConfig,
        store: Arc<dyn HealthStore>,
        transport: Arc<dyn UploadTransport>,
        service: Arc<dyn ServiceConfig>,
        settings: Arc<SettingsStore>,
    ) -> SyncResult<SyncEngine> {
        migrate_schema(&settings)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(100);

        // Store observation callbacks land on their own channel and are
        // re-marshaled onto the engine loop here.
        let bridge = events_tx.clone();
        tokio::spawn(async move {
            while let Some(handle) = observer_rx.recv().await {
                if bridge.send(EngineEvent::SamplesObserved(handle)).is_err() {
                    break;
                }
            }
        });

        let core = EngineCore::new(
            config,
            store,
            transport,
            service,
            Arc::clone(&settings),
            events_tx.clone(),
            observer_tx,
            notifications.clone(),
        )?;
        let task = tokio::spawn(core.run(events_rx));

        Ok(SyncEngine {
            events: events_tx,
            notifications,
            settings,
            task,
        })
    }

    fn send(&self, command: EngineCommand) -> SyncResult<()> {
        self.events
            .send(EngineEvent::Command(command))
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(())
    }

    /// Turn the upload interface on for a signed-in user. A different user
    /// than the stored one wipes all sync state first.
    pub fn enable_interface(&self, user_id: &str, user_name: Option<&str>) -> SyncResult<()> {
        self.send(EngineCommand::EnableInterface {
            user_id: user_id.to_string(),
            user_name: user_name.map(str::to_string),
        })
    }

    /// Turn the interface off: stops everything and clears sync state while
    /// keeping the user binding.
    pub fn disable_interface(&self) -> SyncResult<()> {
        self.send(EngineCommand::DisableInterface)
    }

    /// Reconcile persisted interface state with the current sign-in; call
    /// once at app start after the service configuration is ready.
    pub fn configure(&self) -> SyncResult<()> {
        self.send(EngineCommand::Configure)
    }

    pub fn start_uploading(&self, mode: SyncMode) -> SyncResult<()> {
        self.send(EngineCommand::StartUploading { mode })
    }

    /// Externally forced stop; never surfaced to subscribers.
    pub fn stop_uploading(&self, mode: SyncMode) -> SyncResult<()> {
        self.send(EngineCommand::StopUploading {
            mode,
            reason: StopReason::TurnedOff,
        })
    }

    /// Restart any pipeline that stopped somewhere it can pick up from.
    pub fn resume_if_resumable(&self) -> SyncResult<()> {
        self.send(EngineCommand::ResumeIfResumable)
    }

    pub fn set_app_phase(&self, phase: AppPhase) -> SyncResult<()> {
        self.send(EngineCommand::AppPhaseChanged(phase))
    }

    /// Subscribe to engine notifications. Slow subscribers lose the oldest
    /// notifications rather than blocking the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    /// Durable per-pipeline counters, readable without touching the loop.
    pub fn progress(&self, key: PipelineKey) -> SyncResult<UploadProgress> {
        let tracker = UploadStatsTracker::new(key, Arc::clone(&self.settings))?;
        Ok(tracker.progress().clone())
    }

    /// App-level progress derived from the global fenceposts.
    pub fn global_progress(&self) -> SyncResult<GlobalProgress> {
        let last = self
            .settings
            .global_date(GlobalDateField::LastSuccessfulCurrentUpload)?;
        let earliest = self.settings.global_date(GlobalDateField::HistoricalEarliest)?;
        let fence = self.settings.global_date(GlobalDateField::HistoricalFence)?;
        let start = self.settings.global_date(GlobalDateField::CurrentStart)?;
        let total = match (earliest, start) {
            (Some(earliest), Some(start)) => days_between(earliest, start).max(0),
            _ => 0,
        };
        let current = match (earliest, fence) {
            (Some(earliest), Some(fence)) => days_between(earliest, fence).max(0),
            _ => 0,
        };
        Ok(GlobalProgress {
            last_current_upload_at: last,
            total_days_historical: total,
            current_day_historical: current,
        })
    }

    /// Stop the loop and wait for it to drain. In-flight upload rounds keep
    /// their durable pending flag so a restart re-reads their batch.
    pub async fn shutdown(self) {
        let _ = self.send(EngineCommand::Shutdown);
        let _ = self.task.await;
    }
}

/// Wipe everything once per schema change. The stored version is stamped
/// on first run so a fresh install never wipes.
fn migrate_schema(settings: &SettingsStore) -> SyncResult<()> {
    let current = u64::from(UPLOADER_SCHEMA_VERSION);
    match settings.global_count(GlobalCountField::LastExecutedSchemaVersion)? {
        Some(version) if version == current => Ok(()),
        Some(version) => {
            warn!(from = version, to = current, "engine: schema changed; wiping sync state");
            settings.wipe_all()?;
            settings.set_global_count(GlobalCountField::LastExecutedSchemaVersion, current)
        }
        None => settings.set_global_count(GlobalCountField::LastExecutedSchemaVersion, current),
    }
}

struct Pipeline {
    reader: SampleReader,
    uploader: SampleUploader,
    stats: UploadStatsTracker,
    /// True between a start and a hard stop. Soft stops on `Current` leave
    /// this set so store observations re-arm the read cycle.
    is_uploading: bool,
    /// Bumped on every start, stop, and cancel; completions carrying an
    /// older epoch are dropped.
    epoch: u64,
    /// OS background-task bracket around a backgrounded round, if one is
    /// open. Presence also limits background cycles to a single batch.
    bg_token: Option<BackgroundTaskToken>,
}

impl Pipeline {
    fn new(
        key: PipelineKey,
        config: &UploaderConfig,
        transport: Arc<dyn UploadTransport>,
        settings: Arc<SettingsStore>,
    ) -> SyncResult<Pipeline> {
        Ok(Pipeline {
            reader: SampleReader::new(key, Arc::clone(&settings)),
            uploader: SampleUploader::new(key, config, transport, Arc::clone(&settings)),
            stats: UploadStatsTracker::new(key, settings)?,
            is_uploading: false,
            epoch: 0,
            bg_token: None,
        })
    }
}

struct EngineCore {
    config: UploaderConfig,
    store: Arc<dyn HealthStore>,
    service: Arc<dyn ServiceConfig>,
    settings: Arc<SettingsStore>,
    events_tx: UnboundedSender<EngineEvent>,
    observer_tx: UnboundedSender<StoreTypeHandle>,
    notifications: broadcast::Sender<SyncNotification>,
    pipelines: HashMap<PipelineKey, Pipeline>,
    app_phase: AppPhase,
}

impl EngineCore {
    #[allow(clippy::too_many_arguments)]
    fn new(
        config: UploaderConfig,
        store: Arc<dyn HealthStore>,
        transport: Arc<dyn UploadTransport>,
        service: Arc<dyn ServiceConfig>,
        settings: Arc<SettingsStore>,
        events_tx: UnboundedSender<EngineEvent>,
        observer_tx: UnboundedSender<StoreTypeHandle>,
        notifications: broadcast::Sender<SyncNotification>,
    ) -> SyncResult<EngineCore> {
        let mut pipelines = HashMap::new();
        for key in PipelineKey::all() {
            pipelines.insert(
                key,
                Pipeline::new(key, &config, Arc::clone(&transport), Arc::clone(&settings))?,
            );
        }
        Ok(EngineCore {
            config,
            store,
            service,
            settings,
            events_tx,
            observer_tx,
            notifications,
            pipelines,
            app_phase: AppPhase::Foreground,
        })
    }

    async fn run(mut self, mut events: UnboundedReceiver<EngineEvent>) {
        info!("engine: loop started");
        while let Some(event) = events.recv().await {
            if matches!(event, EngineEvent::Command(EngineCommand::Shutdown)) {
                info!("engine: shutting down");
                break;
            }
            if let Err(error) = self.handle_event(event) {
                error!(%error, "engine: event handling failed");
            }
        }
    }

    fn handle_event(&mut self, event: EngineEvent) -> SyncResult<()> {
        match event {
            EngineEvent::Command(command) => self.handle_command(command),
            EngineEvent::SamplesObserved(handle) => self.handle_samples_observed(handle),
            EngineEvent::ReadCompleted { key, epoch, result } => {
                self.handle_read_completed(key, epoch, result)
            }
            EngineEvent::ProbeCompleted { key, epoch, result } => {
                self.handle_probe_completed(key, epoch, result)
            }
            EngineEvent::UploadCompleted { key, epoch, result } => {
                self.handle_upload_completed(key, epoch, result)
            }
        }
    }

    fn handle_command(&mut self, command: EngineCommand) -> SyncResult<()> {
        match command {
            EngineCommand::EnableInterface { user_id, user_name } => {
                self.enable_interface(user_id, user_name)
            }
            EngineCommand::DisableInterface => self.disable_interface(),
            EngineCommand::Configure => self.configure(),
            EngineCommand::StartUploading { mode } => self.start_mode(mode),
            EngineCommand::StopUploading { mode, reason } => self.stop_mode(mode, reason),
            EngineCommand::ResumeIfResumable => self.resume_if_resumable(),
            EngineCommand::AppPhaseChanged(phase) => self.handle_app_phase(phase),
            EngineCommand::Shutdown => Ok(()),
        }
    }

    // --- Interface lifecycle ---

    fn enable_interface(&mut self, user_id: String, user_name: Option<String>) -> SyncResult<()> {
        let stored = self.settings.global_string(GlobalStringField::InterfaceUserId)?;
        if let Some(stored) = stored {
            if stored != user_id {
                info!(user = %user_id, "engine: user switched; wiping sync state");
                self.wipe_sync_state()?;
            }
        }
        self.settings
            .set_global_string(GlobalStringField::InterfaceUserId, &user_id)?;
        match user_name.as_deref() {
            Some(name) => self
                .settings
                .set_global_string(GlobalStringField::InterfaceUserName, name)?,
            None => self
                .settings
                .clear_global_string(GlobalStringField::InterfaceUserName)?,
        }
        self.settings
            .set_global_flag(GlobalFlagField::InterfaceEnabled, true)?;
        info!(user = %user_id, "engine: interface enabled");
        self.start_mode(SyncMode::Current)?;
        self.resume_if_resumable()
    }

    fn disable_interface(&mut self) -> SyncResult<()> {
        self.settings
            .set_global_flag(GlobalFlagField::InterfaceEnabled, false)?;
        self.wipe_sync_state()?;
        info!("engine: interface disabled");
        Ok(())
    }

    /// Stop every pipeline silently and clear all sync state. The user
    /// binding survives so re-enabling the same user does not wipe twice.
    fn wipe_sync_state(&mut self) -> SyncResult<()> {
        for key in PipelineKey::all() {
            self.stop_pipeline(key, StopReason::TurnedOff)?;
        }
        for (key, pipeline) in &mut self.pipelines {
            pipeline.reader.reset_persistent_state()?;
            pipeline.stats.reset()?;
            let _ = self
                .notifications
                .send(SyncNotification::StatsUpdated { key: *key });
        }
        self.settings.reset_historical_globals()?;
        self.settings.reset_current_globals()?;
        Ok(())
    }

    fn configure(&mut self) -> SyncResult<()> {
        if !self.settings.global_flag(GlobalFlagField::InterfaceEnabled)? {
            debug!("engine: interface disabled; nothing to configure");
            return Ok(());
        }
        let stored = self.settings.global_string(GlobalStringField::InterfaceUserId)?;
        match (stored, self.service.current_user_id()) {
            (Some(stored), Some(current)) if stored == current => {
                self.start_mode(SyncMode::Current)?;
                self.resume_if_resumable()
            }
            _ => {
                warn!("engine: signed-in user does not match interface user; holding uploads");
                for key in PipelineKey::all() {
                    self.stop_pipeline(key, StopReason::TurnedOff)?;
                }
                Ok(())
            }
        }
    }

    // --- Pipeline start/stop ---

    fn start_mode(&mut self, mode: SyncMode) -> SyncResult<()> {
        if !self.settings.global_flag(GlobalFlagField::InterfaceEnabled)? {
            debug!(%mode, "engine: interface disabled; not starting");
            return Ok(());
        }
        if self.service.current_user_id().is_none() {
            return Err(EngineError::MissingUser.into());
        }
        if self.service.upload_session_id().is_none() {
            return Err(EngineError::MissingUploadSession.into());
        }
        self.init_fenceposts()?;

        let mut started = false;
        for kind in SampleKind::ALL {
            started |= self.start_pipeline(PipelineKey::new(kind, mode))?;
        }
        if started {
            let _ = self
                .notifications
                .send(SyncNotification::UploadingStarted { mode });
        }
        Ok(())
    }

    fn stop_mode(&mut self, mode: SyncMode, reason: StopReason) -> SyncResult<()> {
        for kind in SampleKind::ALL {
            self.stop_pipeline(PipelineKey::new(kind, mode), reason.clone())?;
        }
        Ok(())
    }

    /// Seed the global fenceposts on first start: `Current` reads forward
    /// from a short lookback window, and the historical fence starts there
    /// so backfill covers everything older.
    fn init_fenceposts(&self) -> SyncResult<()> {
        if self
            .settings
            .global_date(GlobalDateField::CurrentStart)?
            .is_some()
        {
            return Ok(());
        }
        let start = Utc::now() - Duration::days(self.config.current_lookback_days);
        self.settings
            .set_global_date(GlobalDateField::CurrentStart, start)?;
        self.settings
            .set_global_date(GlobalDateField::HistoricalFence, start)?;
        self.settings
            .set_global_date(GlobalDateField::HistoricalEarliest, start)?;
        info!(start = %start, "engine: fenceposts initialized");
        Ok(())
    }

    /// Returns true when the pipeline actually started. A pipeline that is
    /// not resumable starts over from scratch.
    fn start_pipeline(&mut self, key: PipelineKey) -> SyncResult<bool> {
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(false);
            };
            if pipeline.is_uploading {
                return Ok(false);
            }
            if !pipeline.reader.is_resumable()? {
                pipeline.stats.reset()?;
                pipeline.reader.reset_persistent_state()?;
                let _ = self
                    .notifications
                    .send(SyncNotification::StatsUpdated { key });
            }
            pipeline.uploader.cancel_tasks()?;
            pipeline.epoch += 1;
            pipeline.is_uploading = true;
            info!(pipeline = %key, "engine: pipeline started");
        }
        if key.mode == SyncMode::Current {
            let handle = key.kind.store_type_handle();
            self.store.start_observing(handle, self.observer_tx.clone())?;
            self.store.enable_background_delivery(handle)?;
        }
        self.begin_read_cycle(key)?;
        Ok(true)
    }

    fn stop_pipeline(&mut self, key: PipelineKey, reason: StopReason) -> SyncResult<()> {
        let notify = {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            if !pipeline.is_uploading
                && !pipeline.reader.is_reading()
                && !pipeline.uploader.is_uploading()
            {
                return Ok(());
            }
            pipeline.reader.stop_reading(&reason);
            pipeline.epoch += 1;
            pipeline.uploader.cancel_tasks()?;
            if let Some(token) = pipeline.bg_token.take() {
                self.service.end_background_task(token);
            }
            let turned_off = matches!(reason, StopReason::TurnedOff);
            if turned_off || key.mode == SyncMode::HistoricalAll {
                pipeline.is_uploading = false;
            }
            info!(pipeline = %key, reason = %reason, "engine: pipeline stopped");
            !turned_off
        };
        if matches!(reason, StopReason::TurnedOff) && key.mode == SyncMode::Current {
            let handle = key.kind.store_type_handle();
            self.store.stop_observing(handle)?;
            self.store.disable_background_delivery(handle)?;
        }
        if notify {
            let _ = self
                .notifications
                .send(SyncNotification::UploadingStopped {
                    mode: key.mode,
                    reason,
                });
        }
        Ok(())
    }

    fn resume_if_resumable(&mut self) -> SyncResult<()> {
        if !self.settings.global_flag(GlobalFlagField::InterfaceEnabled)? {
            return Ok(());
        }
        if self.service.current_user_id().is_none() || self.service.upload_session_id().is_none() {
            debug!("engine: no session; resume deferred");
            return Ok(());
        }
        let mut restarted_historical = false;
        for key in PipelineKey::all() {
            // full restart, re-armed read cycle, or nothing
            let action = {
                let Some(pipeline) = self.pipelines.get(&key) else {
                    continue;
                };
                if pipeline.is_uploading {
                    if pipeline.reader.is_reading() || pipeline.uploader.is_uploading() {
                        None
                    } else {
                        Some(ResumeAction::Kick)
                    }
                } else if pipeline.reader.is_resumable()? {
                    Some(ResumeAction::Start)
                } else {
                    None
                }
            };
            match action {
                Some(ResumeAction::Start) => {
                    if self.start_pipeline(key)? && key.mode == SyncMode::HistoricalAll {
                        restarted_historical = true;
                    }
                }
                Some(ResumeAction::Kick) => self.begin_read_cycle(key)?,
                None => {}
            }
        }
        if restarted_historical {
            let _ = self.notifications.send(SyncNotification::UploadingStarted {
                mode: SyncMode::HistoricalAll,
            });
        }
        Ok(())
    }

    fn handle_app_phase(&mut self, phase: AppPhase) -> SyncResult<()> {
        self.app_phase = phase;
        debug!(?phase, "engine: app phase changed");
        if phase == AppPhase::Foreground {
            // close open brackets so in-flight rounds finish as normal
            // foreground rounds
            for pipeline in self.pipelines.values_mut() {
                if let Some(token) = pipeline.bg_token.take() {
                    self.service.end_background_task(token);
                }
            }
            self.resume_if_resumable()?;
        }
        Ok(())
    }

    // --- Read cycle ---

    fn begin_read_cycle(&mut self, key: PipelineKey) -> SyncResult<()> {
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            if !pipeline.reader.start_reading() {
                return Ok(());
            }
        }
        self.continue_read(key)
    }

    fn continue_read(&mut self, key: PipelineKey) -> SyncResult<()> {
        let (epoch, plan) = {
            let Some(pipeline) = self.pipelines.get(&key) else {
                return Ok(());
            };
            (pipeline.epoch, pipeline.reader.plan_read()?)
        };
        self.dispatch_plan(key, epoch, plan)
    }

    fn dispatch_plan(&mut self, key: PipelineKey, epoch: u64, plan: ReadPlan) -> SyncResult<()> {
        match plan {
            ReadPlan::Anchored {
                handle,
                start,
                anchor,
                limit,
            } => {
                let store = Arc::clone(&self.store);
                let events = self.events_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = store
                        .anchored_fetch(handle, start, anchor.as_ref(), limit)
                        .map(FetchOutcome::Anchored);
                    let _ = events.send(EngineEvent::ReadCompleted { key, epoch, result });
                });
                Ok(())
            }
            ReadPlan::Descending {
                handle,
                before,
                limit,
            } => {
                let store = Arc::clone(&self.store);
                let events = self.events_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = store
                        .fetch_descending(handle, before, limit)
                        .map(FetchOutcome::Descending);
                    let _ = events.send(EngineEvent::ReadCompleted { key, epoch, result });
                });
                Ok(())
            }
            ReadPlan::RangeProbe { handle } => {
                let store = Arc::clone(&self.store);
                let events = self.events_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = store.earliest_sample_time(handle).and_then(|earliest| {
                        store
                            .latest_sample_time(handle)
                            .map(|latest| (earliest, latest))
                    });
                    let _ = events.send(EngineEvent::ProbeCompleted { key, epoch, result });
                });
                Ok(())
            }
            ReadPlan::Exhausted => self.finish_historical(key),
        }
    }

    fn is_stale(&self, key: PipelineKey, epoch: u64) -> bool {
        match self.pipelines.get(&key) {
            Some(pipeline) => {
                let stale = pipeline.epoch != epoch;
                if stale {
                    debug!(pipeline = %key, epoch, "engine: stale completion dropped");
                }
                stale
            }
            None => true,
        }
    }

    fn handle_read_completed(
        &mut self,
        key: PipelineKey,
        epoch: u64,
        result: SyncResult<FetchOutcome>,
    ) -> SyncResult<()> {
        if self.is_stale(key, epoch) {
            return Ok(());
        }
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                error!(pipeline = %key, %error, "engine: read failed");
                return self.stop_pipeline(
                    key,
                    StopReason::Error {
                        message: error.to_string(),
                    },
                );
            }
        };
        match outcome {
            FetchOutcome::Anchored(fetch) => self.handle_anchored_page(key, fetch),
            FetchOutcome::Descending(samples) => self.handle_descending_page(key, samples),
        }
    }

    fn handle_anchored_page(&mut self, key: PipelineKey, fetch: AnchoredFetch) -> SyncResult<()> {
        if fetch.is_empty() {
            return self.stop_pipeline(key, StopReason::WithNoNewResults);
        }
        let filtered = key.kind.filter_samples(fetch.added);
        if filtered.is_empty() && fetch.deleted.is_empty() {
            // page fully filtered away: advance the anchor without a round
            {
                let Some(pipeline) = self.pipelines.get_mut(&key) else {
                    return Ok(());
                };
                pipeline.reader.stage_anchor(fetch.anchor);
                pipeline.reader.promote_last_anchor()?;
            }
            return self.continue_read(key);
        }
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            pipeline
                .reader
                .ingest_anchored(filtered, fetch.deleted, fetch.anchor);
        }
        self.begin_upload_round(key)
    }

    fn handle_descending_page(
        &mut self,
        key: PipelineKey,
        samples: Vec<HealthSample>,
    ) -> SyncResult<()> {
        if samples.is_empty() {
            return self.finish_historical(key);
        }
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            pipeline.reader.ingest_descending(samples, MAX_BATCH_SIZE);
        }
        self.begin_upload_round(key)
    }

    fn handle_probe_completed(
        &mut self,
        key: PipelineKey,
        epoch: u64,
        result: SyncResult<(Option<chrono::DateTime<Utc>>, Option<chrono::DateTime<Utc>>)>,
    ) -> SyncResult<()> {
        if self.is_stale(key, epoch) {
            return Ok(());
        }
        let bounds = match result {
            Ok(bounds) => bounds,
            Err(error) => {
                error!(pipeline = %key, %error, "engine: range probe failed");
                return self.stop_pipeline(
                    key,
                    StopReason::Error {
                        message: error.to_string(),
                    },
                );
            }
        };
        let (Some(earliest), Some(latest)) = bounds else {
            debug!(pipeline = %key, "engine: no samples on record; nothing to backfill");
            return self.stop_pipeline(key, StopReason::WithNoNewResults);
        };
        let fence = match self.settings.global_date(GlobalDateField::HistoricalFence)? {
            Some(fence) => fence,
            None => {
                warn!(pipeline = %key, "engine: no historical fence; using now");
                Utc::now()
            }
        };
        let span = {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            let span = pipeline.reader.record_range_probe(earliest, latest, fence)?;
            pipeline.stats.set_historical_span(span)?;
            span
        };
        let stored = self.settings.global_date(GlobalDateField::HistoricalEarliest)?;
        if stored.map_or(true, |stored| earliest < stored) {
            self.settings
                .set_global_date(GlobalDateField::HistoricalEarliest, earliest)?;
        }
        let _ = self
            .notifications
            .send(SyncNotification::StatsUpdated { key });
        info!(pipeline = %key, span, "engine: historical range discovered");
        self.continue_read(key)
    }

    // --- Upload rounds ---

    fn begin_upload_round(&mut self, key: PipelineKey) -> SyncResult<()> {
        if !self.service.is_connected_to_network() {
            info!(pipeline = %key, "engine: network unavailable; stopping cycle");
            return self.stop_pipeline(
                key,
                StopReason::Error {
                    message: "network unavailable".to_string(),
                },
            );
        }
        let upload_id = self
            .service
            .upload_session_id()
            .ok_or(EngineError::MissingUploadSession)?;

        let (samples, deletes, epoch) = {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            let samples = pipeline.reader.pop_samples(MAX_BATCH_SIZE);
            let deletes = pipeline.reader.pop_deletes(MAX_BATCH_SIZE);
            let range = pipeline.reader.take_round_range();
            pipeline
                .stats
                .record_attempt(Utc::now(), samples.len() as u64, range)?;
            (samples, deletes, pipeline.epoch)
        };
        let _ = self
            .notifications
            .send(SyncNotification::StatsUpdated { key });

        let records = key.kind.prepare_data_for_upload(&samples);
        let markers = key.kind.prepare_data_for_delete(&deletes);

        let events = self.events_tx.clone();
        let Some(pipeline) = self.pipelines.get_mut(&key) else {
            return Ok(());
        };
        // backgrounded live rounds run inside an OS task bracket and stop
        // after one batch
        if key.mode == SyncMode::Current
            && self.app_phase == AppPhase::Background
            && pipeline.bg_token.is_none()
        {
            let token = self
                .service
                .begin_background_task(pipeline.uploader.session_name());
            pipeline.bg_token = Some(token);
        }
        pipeline.uploader.begin(upload_id, records, markers, epoch, events)
    }

    fn handle_upload_completed(
        &mut self,
        key: PipelineKey,
        epoch: u64,
        result: SyncResult<UploadSummary>,
    ) -> SyncResult<()> {
        if self.is_stale(key, epoch) {
            return Ok(());
        }
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            pipeline.uploader.finish()?;
        }
        let summary = match result {
            Ok(summary) => summary,
            Err(SyncError::UploadError(UploadError::Cancelled)) => {
                return self.stop_pipeline(key, StopReason::WithResults);
            }
            Err(SyncError::UploadError(UploadError::TokenExpired)) => {
                warn!(pipeline = %key, "engine: session token expired; requesting refresh");
                let _ = self.notifications.send(SyncNotification::AuthRefreshRequested);
                return self.stop_pipeline(
                    key,
                    StopReason::Error {
                        message: "session token expired".to_string(),
                    },
                );
            }
            Err(error) => {
                error!(pipeline = %key, %error, "engine: upload failed");
                return self.stop_pipeline(
                    key,
                    StopReason::Error {
                        message: error.to_string(),
                    },
                );
            }
        };

        let now = Utc::now();
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            pipeline.stats.record_success(now)?;
        }
        let _ = self
            .notifications
            .send(SyncNotification::StatsUpdated { key });
        debug!(
            pipeline = %key,
            posted = summary.posted,
            deleted = summary.deleted,
            rejected = summary.rejected,
            "engine: round confirmed"
        );

        match key.mode {
            SyncMode::Current => {
                let Some(pipeline) = self.pipelines.get_mut(&key) else {
                    return Ok(());
                };
                pipeline.reader.promote_last_anchor()?;
                self.settings
                    .set_global_date(GlobalDateField::LastSuccessfulCurrentUpload, now)?;
            }
            SyncMode::HistoricalAll => {
                let Some(pipeline) = self.pipelines.get_mut(&key) else {
                    return Ok(());
                };
                if let Some(earliest) = pipeline.stats.progress().last_success_earliest {
                    pipeline.reader.rewind_fence(earliest)?;
                    let fence = self.settings.global_date(GlobalDateField::HistoricalFence)?;
                    if fence.map_or(true, |fence| earliest < fence) {
                        self.settings
                            .set_global_date(GlobalDateField::HistoricalFence, earliest)?;
                    }
                }
            }
        }

        let (backgrounded, has_buffer, exhausted) = {
            let Some(pipeline) = self.pipelines.get(&key) else {
                return Ok(());
            };
            (
                pipeline.bg_token.is_some(),
                pipeline.reader.buffered_sample_count() > 0
                    || pipeline.reader.buffered_delete_count() > 0,
                pipeline.reader.is_exhausted(),
            )
        };
        if backgrounded {
            return self.stop_pipeline(key, StopReason::WithResults);
        }
        if has_buffer {
            return self.begin_upload_round(key);
        }
        if key.mode == SyncMode::HistoricalAll && exhausted {
            return self.finish_historical(key);
        }
        self.continue_read(key)
    }

    /// A historical pipeline ran out of older data: pin its indicator to
    /// 100%, collapse its bounds, and stop.
    fn finish_historical(&mut self, key: PipelineKey) -> SyncResult<()> {
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            pipeline.stats.record_historical_end_state()?;
            pipeline.reader.mark_exhausted()?;
        }
        let _ = self
            .notifications
            .send(SyncNotification::StatsUpdated { key });
        let _ = self
            .notifications
            .send(SyncNotification::HistoricalComplete { kind: key.kind });
        info!(pipeline = %key, "engine: historical backfill complete");
        self.stop_pipeline(key, StopReason::WithNoNewResults)
    }

    // --- Observation ---

    fn handle_samples_observed(&mut self, handle: StoreTypeHandle) -> SyncResult<()> {
        let Some(kind) = SampleKind::from_store_type_handle(handle) else {
            warn!(%handle, "engine: observation for unknown sample type");
            return Ok(());
        };
        let key = PipelineKey::new(kind, SyncMode::Current);
        {
            let Some(pipeline) = self.pipelines.get_mut(&key) else {
                return Ok(());
            };
            if !pipeline.is_uploading {
                debug!(pipeline = %key, "engine: observation while stopped; ignoring");
                return Ok(());
            }
            if pipeline.uploader.is_uploading() {
                // supersede the round: its anchor was never promoted, so the
                // fresh read re-fetches the same page plus the new data
                debug!(pipeline = %key, "engine: observation during round; restarting cycle");
                pipeline.uploader.cancel_tasks()?;
                pipeline.epoch += 1;
                pipeline.reader.stop_reading(&StopReason::WithResults);
                if let Some(token) = pipeline.bg_token.take() {
                    self.service.end_background_task(token);
                }
            } else if pipeline.reader.is_reading() {
                debug!(pipeline = %key, "engine: observation during read; already covered");
                return Ok(());
            }
        }
        self.begin_read_cycle(key)
    }
}

enum ResumeAction {
    Start,
    Kick,
}
