/// Pipeline version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Persisted-state schema version. A mismatch against the recorded version
/// wipes all anchors, fences, and stats before the pipeline starts.
pub const UPLOADER_SCHEMA_VERSION: u32 = 8;

/// Maximum samples (or deletion markers) per read page and per POST body.
pub const MAX_BATCH_SIZE: usize = 500;

/// Wire timestamp format for record `time` fields (UTC, millisecond, Zulu).
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Timestamp format for device-local times (no zone suffix).
pub const DEVICE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// Store metadata keys the transformers and fixtures agree on.

/// User-entered flag on manually logged samples.
pub const METADATA_WAS_USER_ENTERED: &str = "HKWasUserEntered";
/// CGM receiver's local display time at capture.
pub const METADATA_RECEIVER_DISPLAY_TIME: &str = "Receiver Display Time";
/// Insulin delivery reason (1 = basal, 2 = bolus).
pub const METADATA_INSULIN_DELIVERY_REASON: &str = "HKInsulinDeliveryReason";
/// Scheduled basal rate suppressed by a temp basal (units/hour).
pub const METADATA_SCHEDULED_BASAL_RATE: &str =
    "com.loopkit.InsulinKit.MetadataKeyScheduledBasalRate";
/// Free-text food name attached to a carb entry.
pub const METADATA_FOOD_TYPE: &str = "HKFoodType";

/// Insulin delivery reason value for basal.
pub const INSULIN_REASON_BASAL: i64 = 1;
/// Insulin delivery reason value for bolus.
pub const INSULIN_REASON_BOLUS: i64 = 2;
