use serde::{Deserialize, Serialize};
use std::fmt;

use super::mode::SyncMode;

/// Closed set of health metrics the pipeline uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    BloodGlucose,
    Insulin,
    Carb,
    Workout,
}

impl SampleKind {
    pub const ALL: [SampleKind; 4] = [
        SampleKind::BloodGlucose,
        SampleKind::Insulin,
        SampleKind::Carb,
        SampleKind::Workout,
    ];

    /// Stable name used in settings scopes and session identifiers.
    pub fn type_name(self) -> &'static str {
        match self {
            SampleKind::BloodGlucose => "BloodGlucose",
            SampleKind::Insulin => "Insulin",
            SampleKind::Carb => "Carb",
            SampleKind::Workout => "Workout",
        }
    }

    /// The on-device store's identifier for this metric.
    pub fn store_type_handle(self) -> StoreTypeHandle {
        match self {
            SampleKind::BloodGlucose => {
                StoreTypeHandle("HKQuantityTypeIdentifierBloodGlucose")
            }
            SampleKind::Insulin => {
                StoreTypeHandle("HKQuantityTypeIdentifierInsulinDelivery")
            }
            SampleKind::Carb => {
                StoreTypeHandle("HKQuantityTypeIdentifierDietaryCarbohydrates")
            }
            SampleKind::Workout => StoreTypeHandle("HKWorkoutTypeIdentifier"),
        }
    }

    /// Reverse lookup from a store handle to the kind it belongs to.
    pub fn from_store_type_handle(handle: StoreTypeHandle) -> Option<SampleKind> {
        SampleKind::ALL
            .into_iter()
            .find(|kind| kind.store_type_handle() == handle)
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Opaque identifier the on-device store uses for one sample type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreTypeHandle(pub &'static str);

impl fmt::Display for StoreTypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One independent pipeline: a (kind, mode) pair.
///
/// Each pair owns its reader, uploader, stats, anchor, and network session;
/// nothing is shared across pairs except the settings store itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineKey {
    pub kind: SampleKind,
    pub mode: SyncMode,
}

impl PipelineKey {
    pub fn new(kind: SampleKind, mode: SyncMode) -> Self {
        Self { kind, mode }
    }

    /// Every (kind, mode) pair, modes outermost.
    pub fn all() -> impl Iterator<Item = PipelineKey> {
        SyncMode::ALL.into_iter().flat_map(|mode| {
            SampleKind::ALL
                .into_iter()
                .map(move |kind| PipelineKey { kind, mode })
        })
    }
}

impl fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.mode, self.kind)
    }
}
