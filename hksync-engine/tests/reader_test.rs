//! Sample-reader tests: query planning, cursor durability, exhaustion, and
//! resumability.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use proptest::prelude::*;

use hksync_core::constants::MAX_BATCH_SIZE;
use hksync_core::traits::HealthStore;
use hksync_core::types::{PipelineKey, QueryAnchor, SampleKind, StopReason, SyncMode};
use hksync_engine::reader::{ReadPlan, SampleReader};
use hksync_settings::{DateField, GlobalDateField, SettingsStore};
use test_fixtures::{deletion, glucose_sample, ts, MockHealthStore};

fn settings() -> Arc<SettingsStore> {
    Arc::new(SettingsStore::open_in_memory().unwrap())
}

fn current_key() -> PipelineKey {
    PipelineKey::new(SampleKind::BloodGlucose, SyncMode::Current)
}

fn historical_key() -> PipelineKey {
    PipelineKey::new(SampleKind::BloodGlucose, SyncMode::HistoricalAll)
}

const DAY: i64 = 86_400;

// ═══════════════════════════════════════════════════════════════════════════
// CURRENT PLANNING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn current_plans_anchored_from_global_start() {
    let settings = settings();
    settings
        .set_global_date(GlobalDateField::CurrentStart, ts(0))
        .unwrap();
    let reader = SampleReader::new(current_key(), Arc::clone(&settings));

    match reader.plan_read().unwrap() {
        ReadPlan::Anchored {
            start,
            anchor,
            limit,
            ..
        } => {
            assert_eq!(start, ts(0));
            assert_eq!(anchor, None);
            assert_eq!(limit, MAX_BATCH_SIZE);
        }
        plan => panic!("expected anchored plan, got {plan:?}"),
    }
}

#[test]
fn current_plan_carries_persisted_anchor() {
    let settings = settings();
    settings
        .set_global_date(GlobalDateField::CurrentStart, ts(0))
        .unwrap();
    settings
        .set_anchor(current_key(), &QueryAnchor::new("42"))
        .unwrap();
    let reader = SampleReader::new(current_key(), settings);

    match reader.plan_read().unwrap() {
        ReadPlan::Anchored { anchor, .. } => {
            assert_eq!(anchor, Some(QueryAnchor::new("42")));
        }
        plan => panic!("expected anchored plan, got {plan:?}"),
    }
}

#[test]
fn current_plan_without_fencepost_still_anchors() {
    let reader = SampleReader::new(current_key(), settings());
    assert!(matches!(
        reader.plan_read().unwrap(),
        ReadPlan::Anchored { .. }
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// ANCHOR PROMOTION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn anchor_is_durable_only_after_promotion() {
    let settings = settings();
    let mut reader = SampleReader::new(current_key(), Arc::clone(&settings));
    reader.start_reading();
    reader.ingest_anchored(
        vec![glucose_sample(ts(0), 100.0)],
        vec![],
        QueryAnchor::new("7"),
    );

    assert_eq!(settings.anchor(current_key()).unwrap(), None);
    reader.promote_last_anchor().unwrap();
    assert_eq!(
        settings.anchor(current_key()).unwrap(),
        Some(QueryAnchor::new("7"))
    );
}

#[test]
fn stop_reading_drops_staged_anchor_and_buffer() {
    let settings = settings();
    let mut reader = SampleReader::new(current_key(), Arc::clone(&settings));
    reader.start_reading();
    reader.ingest_anchored(
        vec![glucose_sample(ts(0), 100.0)],
        vec![deletion()],
        QueryAnchor::new("9"),
    );

    reader.stop_reading(&StopReason::WithNoNewResults);
    reader.promote_last_anchor().unwrap();

    assert_eq!(settings.anchor(current_key()).unwrap(), None);
    assert_eq!(reader.buffered_sample_count(), 0);
    assert_eq!(reader.buffered_delete_count(), 0);
}

#[test]
fn start_reading_is_exclusive_until_stopped() {
    let mut reader = SampleReader::new(current_key(), settings());
    assert!(reader.start_reading());
    assert!(!reader.start_reading());
    reader.stop_reading(&StopReason::WithResults);
    assert!(reader.start_reading());
}

// ═══════════════════════════════════════════════════════════════════════════
// HISTORICAL PLANNING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn historical_without_bounds_plans_range_probe() {
    let reader = SampleReader::new(historical_key(), settings());
    assert!(matches!(
        reader.plan_read().unwrap(),
        ReadPlan::RangeProbe { .. }
    ));
}

#[test]
fn range_probe_persists_bounds_and_returns_span() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));

    // samples cover 10 days; the fence is far in the future
    let span = reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();

    assert_eq!(span, 10);
    assert_eq!(
        settings.date(historical_key(), DateField::QueryStart).unwrap(),
        Some(ts(0))
    );
    // top bound is exclusive, so the latest sample is padded inside it
    assert_eq!(
        settings.date(historical_key(), DateField::QueryEnd).unwrap(),
        Some(ts(10 * DAY) + Duration::seconds(1))
    );
}

#[test]
fn range_probe_caps_top_bound_at_fence() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));

    let span = reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(5 * DAY))
        .unwrap();

    assert_eq!(span, 5);
    assert_eq!(
        settings.date(historical_key(), DateField::QueryEnd).unwrap(),
        Some(ts(5 * DAY))
    );
}

#[test]
fn historical_plans_descending_below_query_end() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();

    match reader.plan_read().unwrap() {
        ReadPlan::Descending { before, limit, .. } => {
            assert_eq!(before, ts(10 * DAY) + Duration::seconds(1));
            assert_eq!(limit, MAX_BATCH_SIZE);
        }
        plan => panic!("expected descending plan, got {plan:?}"),
    }
}

#[test]
fn buffered_leftovers_bound_the_next_page() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();
    reader.ingest_descending(
        vec![glucose_sample(ts(3 * DAY), 100.0), glucose_sample(ts(2 * DAY), 90.0)],
        2,
    );

    match reader.plan_read().unwrap() {
        ReadPlan::Descending { before, .. } => assert_eq!(before, ts(2 * DAY)),
        plan => panic!("expected descending plan, got {plan:?}"),
    }
}

#[test]
fn rewind_fence_moves_query_end() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();

    reader.rewind_fence(ts(4 * DAY)).unwrap();

    assert_eq!(
        settings.date(historical_key(), DateField::QueryEnd).unwrap(),
        Some(ts(4 * DAY))
    );
    match reader.plan_read().unwrap() {
        ReadPlan::Descending { before, .. } => assert_eq!(before, ts(4 * DAY)),
        plan => panic!("expected descending plan, got {plan:?}"),
    }
}

#[test]
fn collapsed_bounds_plan_exhausted() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();
    reader.mark_exhausted().unwrap();

    assert_eq!(
        settings.date(historical_key(), DateField::QueryEnd).unwrap(),
        Some(ts(0))
    );
    assert!(matches!(reader.plan_read().unwrap(), ReadPlan::Exhausted));
}

#[test]
fn short_page_sets_exhausted_flag() {
    let mut reader = SampleReader::new(historical_key(), settings());

    reader.ingest_descending(vec![glucose_sample(ts(0), 100.0)], 3);
    assert!(reader.is_exhausted());

    let mut full = SampleReader::new(historical_key(), settings());
    full.ingest_descending(
        vec![
            glucose_sample(ts(0), 100.0),
            glucose_sample(ts(1), 101.0),
            glucose_sample(ts(2), 102.0),
        ],
        3,
    );
    assert!(!full.is_exhausted());
}

// ═══════════════════════════════════════════════════════════════════════════
// POPPING AND ROUND RANGES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn pop_respects_the_batch_cap() {
    let mut reader = SampleReader::new(historical_key(), settings());
    let samples: Vec<_> = (0..5).map(|i| glucose_sample(ts(i * 60), 100.0)).collect();
    reader.ingest_descending(samples, 5);

    assert_eq!(reader.pop_samples(3).len(), 3);
    assert_eq!(reader.buffered_sample_count(), 2);
}

#[test]
fn round_range_covers_popped_samples() {
    let mut reader = SampleReader::new(current_key(), settings());
    reader.start_reading();
    reader.ingest_anchored(
        vec![
            glucose_sample(ts(0), 100.0),
            glucose_sample(ts(200), 110.0),
            glucose_sample(ts(100), 105.0),
        ],
        vec![],
        QueryAnchor::new("3"),
    );

    reader.pop_samples(10);
    let range = reader.take_round_range().unwrap();
    assert_eq!(range.earliest, ts(0));
    assert_eq!(range.latest, ts(200));
    assert_eq!(reader.take_round_range(), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// RESUMABILITY AND RESET
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn current_is_always_resumable() {
    let reader = SampleReader::new(current_key(), settings());
    assert!(reader.is_resumable().unwrap());
}

#[test]
fn historical_resumable_only_below_the_global_fence() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));

    // no discovered range, no fence
    assert!(!reader.is_resumable().unwrap());

    settings
        .set_global_date(GlobalDateField::HistoricalFence, ts(5 * DAY))
        .unwrap();
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(5 * DAY))
        .unwrap();
    assert!(reader.is_resumable().unwrap());

    // fence caught up with the discovered earliest
    settings
        .set_global_date(GlobalDateField::HistoricalFence, ts(0))
        .unwrap();
    assert!(!reader.is_resumable().unwrap());
}

#[test]
fn reset_clears_cursor_and_buffer() {
    let settings = settings();
    let mut reader = SampleReader::new(historical_key(), Arc::clone(&settings));
    reader
        .record_range_probe(ts(0), ts(10 * DAY), ts(30 * DAY))
        .unwrap();
    reader.ingest_descending(vec![glucose_sample(ts(DAY), 100.0)], 1);

    reader.reset_persistent_state().unwrap();

    assert_eq!(
        settings.date(historical_key(), DateField::QueryStart).unwrap(),
        None
    );
    assert_eq!(
        settings.date(historical_key(), DateField::QueryEnd).unwrap(),
        None
    );
    assert_eq!(reader.buffered_sample_count(), 0);
    assert!(!reader.is_exhausted());
    assert!(matches!(
        reader.plan_read().unwrap(),
        ReadPlan::RangeProbe { .. }
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
// ANCHOR PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn replaying_a_covered_anchor_delivers_nothing(
        secs in proptest::collection::vec(0i64..1_000_000, 0..50),
    ) {
        let store = MockHealthStore::new();
        for offset in &secs {
            store.add_sample(SampleKind::BloodGlucose, glucose_sample(ts(*offset), 100.0));
        }
        let handle = SampleKind::BloodGlucose.store_type_handle();

        let first = store
            .anchored_fetch(handle, ts(0), None, MAX_BATCH_SIZE)
            .unwrap();
        let replay = store
            .anchored_fetch(handle, ts(0), Some(&first.anchor), MAX_BATCH_SIZE)
            .unwrap();

        prop_assert!(replay.is_empty());
        prop_assert_eq!(&replay.anchor, &first.anchor);
    }

    #[test]
    fn unpromoted_anchor_rereads_a_superset_of_the_failed_page(
        first_secs in proptest::collection::vec(0i64..1_000_000, 1..40),
        later_secs in proptest::collection::vec(0i64..1_000_000, 0..40),
    ) {
        let store = MockHealthStore::new();
        for offset in &first_secs {
            store.add_sample(SampleKind::BloodGlucose, glucose_sample(ts(*offset), 100.0));
        }
        let handle = SampleKind::BloodGlucose.store_type_handle();
        let failed = store
            .anchored_fetch(handle, ts(0), None, MAX_BATCH_SIZE)
            .unwrap();

        // the round failed, the anchor was never promoted, more data arrived
        for offset in &later_secs {
            store.add_sample(SampleKind::BloodGlucose, glucose_sample(ts(*offset), 100.0));
        }
        let retry = store
            .anchored_fetch(handle, ts(0), None, MAX_BATCH_SIZE)
            .unwrap();

        let failed_ids: HashSet<_> = failed.added.iter().map(|s| s.id).collect();
        let retry_ids: HashSet<_> = retry.added.iter().map(|s| s.id).collect();
        prop_assert!(failed_ids.is_subset(&retry_ids));
    }
}
