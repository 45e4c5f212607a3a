//! Per-pipeline uploader: one POST-then-DELETE round per batch, run on a
//! blocking task, reporting back through the engine's event channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use hksync_core::config::UploaderConfig;
use hksync_core::errors::{SyncResult, UploadError};
use hksync_core::traits::{UploadOutcome, UploadTransport};
use hksync_core::types::PipelineKey;
use hksync_settings::{FlagField, SettingsStore};

use crate::events::{EngineEvent, UploadSummary};

pub struct SampleUploader {
    key: PipelineKey,
    /// Stable session name, also used to label background-task brackets.
    session_name: String,
    transport: Arc<dyn UploadTransport>,
    settings: Arc<SettingsStore>,
    /// Cancellation flag shared with the in-flight round, if any.
    in_flight: Option<Arc<AtomicBool>>,
}

impl SampleUploader {
    pub fn new(
        key: PipelineKey,
        config: &UploaderConfig,
        transport: Arc<dyn UploadTransport>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let session_name = format!(
            "{}.{}.{}",
            config.session_id_prefix, key.kind, key.mode
        );
        Self {
            key,
            session_name,
            transport,
            settings,
            in_flight: None,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Durable "a round may be in flight" marker, consulted on restart.
    pub fn has_pending_uploads(&self) -> SyncResult<bool> {
        self.settings.flag(self.key, FlagField::PendingUploads)
    }

    /// Start one upload round. Empty rounds complete immediately with no
    /// network activity; everything else sets the durable pending flag,
    /// POSTs records, then DELETEs markers, strictly in that order.
    pub fn begin(
        &mut self,
        upload_id: String,
        records: Vec<Value>,
        markers: Vec<Value>,
        epoch: u64,
        events: UnboundedSender<EngineEvent>,
    ) -> SyncResult<()> {
        if self.in_flight.is_some() {
            warn!(pipeline = %self.key, "uploader: round already in flight; ignoring");
            return Ok(());
        }

        let key = self.key;
        if records.is_empty() && markers.is_empty() {
            let _ = events.send(EngineEvent::UploadCompleted {
                key,
                epoch,
                result: Ok(UploadSummary::default()),
            });
            return Ok(());
        }

        self.settings
            .set_flag(self.key, FlagField::PendingUploads, true)?;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(Arc::clone(&cancelled));

        let transport = Arc::clone(&self.transport);
        debug!(
            session = %self.session_name,
            records = records.len(),
            markers = markers.len(),
            "uploader: round started"
        );
        tokio::task::spawn_blocking(move || {
            let result = run_round(&*transport, &upload_id, records, markers, &cancelled);
            let _ = events.send(EngineEvent::UploadCompleted { key, epoch, result });
        });
        Ok(())
    }

    /// Cancel any outstanding round and clear the durable pending flag.
    /// The round's eventual completion event is discarded by its stale epoch.
    pub fn cancel_tasks(&mut self) -> SyncResult<()> {
        if let Some(cancelled) = self.in_flight.take() {
            cancelled.store(true, Ordering::SeqCst);
            debug!(session = %self.session_name, "uploader: round cancelled");
        }
        self.settings
            .set_flag(self.key, FlagField::PendingUploads, false)
    }

    /// Close out a completed round: clears in-flight state and the durable
    /// pending flag.
    pub fn finish(&mut self) -> SyncResult<()> {
        self.in_flight = None;
        self.settings
            .set_flag(self.key, FlagField::PendingUploads, false)
    }
}

/// One wire round: POST records (stripping individually rejected ones and
/// resubmitting once), then DELETE markers. A second rejection, any other
/// HTTP failure, or a cancel between phases ends the round.
fn run_round(
    transport: &dyn UploadTransport,
    upload_id: &str,
    records: Vec<Value>,
    markers: Vec<Value>,
    cancelled: &AtomicBool,
) -> SyncResult<UploadSummary> {
    if cancelled.load(Ordering::SeqCst) {
        return Err(UploadError::Cancelled.into());
    }

    let mut posted = 0;
    let mut rejected = 0;
    if !records.is_empty() {
        match transport.post_samples(upload_id, &records)? {
            UploadOutcome::Accepted => posted = records.len(),
            UploadOutcome::Rejected { indices } => {
                rejected = indices.len();
                warn!(
                    upload_id,
                    rejected,
                    "uploader: stripping rejected records and resubmitting"
                );
                let keep: Vec<Value> = records
                    .into_iter()
                    .enumerate()
                    .filter(|(index, _)| !indices.contains(index))
                    .map(|(_, record)| record)
                    .collect();
                if !keep.is_empty() {
                    match transport.post_samples(upload_id, &keep)? {
                        UploadOutcome::Accepted => posted = keep.len(),
                        UploadOutcome::Rejected { indices } => {
                            return Err(UploadError::RecordsRejected {
                                count: indices.len(),
                            }
                            .into());
                        }
                    }
                }
            }
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        return Err(UploadError::Cancelled.into());
    }

    let mut deleted = 0;
    if !markers.is_empty() {
        match transport.delete_samples(upload_id, &markers)? {
            UploadOutcome::Accepted => deleted = markers.len(),
            UploadOutcome::Rejected { indices } => {
                return Err(UploadError::RecordsRejected {
                    count: indices.len(),
                }
                .into());
            }
        }
    }

    Ok(UploadSummary {
        posted,
        deleted,
        rejected,
    })
}
