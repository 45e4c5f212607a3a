//! Upload-round tests: POST-before-DELETE ordering, rejection stripping,
//! the durable pending flag, and single-flight enforcement.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;

use hksync_core::config::UploaderConfig;
use hksync_core::errors::{SyncError, UploadError};
use hksync_core::types::{PipelineKey, SampleKind, SyncMode};
use hksync_engine::events::EngineEvent;
use hksync_engine::uploader::SampleUploader;
use hksync_settings::{FlagField, SettingsStore};
use test_fixtures::{CallMethod, RecordingTransport, TransportReply};

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("tokio runtime")
}

fn key() -> PipelineKey {
    PipelineKey::new(SampleKind::BloodGlucose, SyncMode::Current)
}

fn harness() -> (Arc<RecordingTransport>, Arc<SettingsStore>, SampleUploader) {
    let transport = Arc::new(RecordingTransport::new());
    let settings = Arc::new(SettingsStore::open_in_memory().unwrap());
    let uploader = SampleUploader::new(
        key(),
        &UploaderConfig::default(),
        Arc::clone(&transport) as Arc<dyn hksync_core::traits::UploadTransport>,
        Arc::clone(&settings),
    );
    (transport, settings, uploader)
}

fn records(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "record": i })).collect()
}

fn markers(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({ "origin": { "id": i } })).collect()
}

async fn next_result(
    events: &mut UnboundedReceiver<EngineEvent>,
) -> Result<hksync_engine::events::UploadSummary, SyncError> {
    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("upload completion")
        .expect("events channel open");
    match event {
        EngineEvent::UploadCompleted { result, .. } => result,
        other => panic!("unexpected event {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND MECHANICS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn empty_round_completes_without_touching_the_network() {
    let rt = rt();
    rt.block_on(async {
        let (transport, settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();

        uploader
            .begin("upload-1".to_string(), vec![], vec![], 1, tx)
            .unwrap();

        let summary = next_result(&mut rx).await.unwrap();
        assert_eq!(summary.posted, 0);
        assert_eq!(summary.deleted, 0);
        assert!(transport.calls().is_empty());
        assert!(!settings.flag(key(), FlagField::PendingUploads).unwrap());
    });
}

#[test]
fn round_posts_records_before_deleting_markers() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();

        uploader
            .begin("upload-1".to_string(), records(2), markers(1), 1, tx)
            .unwrap();

        let summary = next_result(&mut rx).await.unwrap();
        assert_eq!(summary.posted, 2);
        assert_eq!(summary.deleted, 1);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, CallMethod::Post);
        assert_eq!(calls[0].upload_id, "upload-1");
        assert_eq!(calls[0].bodies.len(), 2);
        assert_eq!(calls[1].method, CallMethod::Delete);
        assert_eq!(calls[1].bodies.len(), 1);
    });
}

#[test]
fn pending_flag_spans_the_round_until_finish() {
    let rt = rt();
    rt.block_on(async {
        let (_transport, settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();

        uploader
            .begin("upload-1".to_string(), records(1), vec![], 1, tx)
            .unwrap();
        // set before the round leaves the process
        assert!(settings.flag(key(), FlagField::PendingUploads).unwrap());

        next_result(&mut rx).await.unwrap();
        // completion alone is not confirmation; the engine clears it
        assert!(settings.flag(key(), FlagField::PendingUploads).unwrap());

        uploader.finish().unwrap();
        assert!(!settings.flag(key(), FlagField::PendingUploads).unwrap());
        assert!(!uploader.is_uploading());
    });
}

#[test]
fn second_begin_while_in_flight_is_ignored() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();

        uploader
            .begin("upload-1".to_string(), records(1), vec![], 1, tx.clone())
            .unwrap();
        uploader
            .begin("upload-1".to_string(), records(3), vec![], 1, tx)
            .unwrap();

        next_result(&mut rx).await.unwrap();
        assert!(
            timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
            "second round must not run"
        );
        assert_eq!(transport.post_count(), 1);
    });
}

#[test]
fn cancel_clears_the_pending_flag() {
    let rt = rt();
    rt.block_on(async {
        let (_transport, settings, mut uploader) = harness();
        let (tx, _rx) = mpsc::unbounded_channel();

        uploader
            .begin("upload-1".to_string(), records(1), vec![], 1, tx)
            .unwrap();
        uploader.cancel_tasks().unwrap();

        assert!(!uploader.is_uploading());
        assert!(!settings.flag(key(), FlagField::PendingUploads).unwrap());
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// REJECTION HANDLING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn rejected_records_are_stripped_and_resubmitted_once() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Reject(vec![1]));

        uploader
            .begin("upload-1".to_string(), records(3), vec![], 1, tx)
            .unwrap();

        let summary = next_result(&mut rx).await.unwrap();
        assert_eq!(summary.posted, 2);
        assert_eq!(summary.rejected, 1);

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].bodies, vec![json!({ "record": 0 }), json!({ "record": 2 })]);
    });
}

#[test]
fn rejection_of_every_record_still_completes_the_post_phase() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Reject(vec![0, 1]));

        uploader
            .begin("upload-1".to_string(), records(2), markers(1), 1, tx)
            .unwrap();

        let summary = next_result(&mut rx).await.unwrap();
        assert_eq!(summary.posted, 0);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.deleted, 1);
        assert_eq!(transport.post_count(), 1);
        assert_eq!(transport.delete_count(), 1);
    });
}

#[test]
fn second_rejection_fails_the_round() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Reject(vec![0]));
        transport.script(TransportReply::Reject(vec![0]));

        uploader
            .begin("upload-1".to_string(), records(2), vec![], 1, tx)
            .unwrap();

        let error = next_result(&mut rx).await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::UploadError(UploadError::RecordsRejected { count: 1 })
        ));
        // the failed round never reaches the delete phase
        assert_eq!(transport.delete_count(), 0);
    });
}

#[test]
fn rejected_delete_fails_the_round() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Accept);
        transport.script(TransportReply::Reject(vec![0]));

        uploader
            .begin("upload-1".to_string(), records(1), markers(1), 1, tx)
            .unwrap();

        let error = next_result(&mut rx).await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::UploadError(UploadError::RecordsRejected { .. })
        ));
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// TRANSPORT FAILURES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn network_failure_surfaces_and_skips_deletes() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Network("connection reset".to_string()));

        uploader
            .begin("upload-1".to_string(), records(1), markers(1), 1, tx)
            .unwrap();

        let error = next_result(&mut rx).await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::UploadError(UploadError::NetworkFailed { .. })
        ));
        assert_eq!(transport.delete_count(), 0);
    });
}

#[test]
fn expired_token_surfaces_as_token_expired() {
    let rt = rt();
    rt.block_on(async {
        let (transport, _settings, mut uploader) = harness();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.script(TransportReply::Http(401));

        uploader
            .begin("upload-1".to_string(), records(1), vec![], 1, tx)
            .unwrap();

        let error = next_result(&mut rx).await.unwrap_err();
        assert!(matches!(
            error,
            SyncError::UploadError(UploadError::TokenExpired)
        ));
    });
}
