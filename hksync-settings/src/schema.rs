//! Typed settings schema.
//!
//! Every durable value is addressed by (scope, field). Field enums are
//! partitioned by value type, so a date can never be read back as a count
//! and a pipeline field can never land in the global scope.

use std::fmt;

use hksync_core::types::PipelineKey;

/// Row partition: one per (kind, mode) pipeline, plus interface-wide state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingScope {
    Global,
    Pipeline(PipelineKey),
}

impl fmt::Display for SettingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingScope::Global => f.write_str("global"),
            SettingScope::Pipeline(key) => write!(f, "{key}"),
        }
    }
}

/// Per-pipeline date-valued fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    /// Lower bound of the pipeline's query range.
    QueryStart,
    /// Upper bound of the pipeline's query range; rewinds as historical
    /// batches are confirmed.
    QueryEnd,
    LastSuccessAt,
    LastSuccessEarliestSample,
    LastSuccessLatestSample,
    LastAttemptAt,
    LastAttemptEarliestSample,
    LastAttemptLatestSample,
}

impl DateField {
    pub const ALL: [DateField; 8] = [
        DateField::QueryStart,
        DateField::QueryEnd,
        DateField::LastSuccessAt,
        DateField::LastSuccessEarliestSample,
        DateField::LastSuccessLatestSample,
        DateField::LastAttemptAt,
        DateField::LastAttemptEarliestSample,
        DateField::LastAttemptLatestSample,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DateField::QueryStart => "queryStartDate",
            DateField::QueryEnd => "queryEndDate",
            DateField::LastSuccessAt => "lastSuccessfulUpload",
            DateField::LastSuccessEarliestSample => "lastSuccessfulUploadEarliestSample",
            DateField::LastSuccessLatestSample => "lastSuccessfulUploadLatestSample",
            DateField::LastAttemptAt => "lastUploadAttempt",
            DateField::LastAttemptEarliestSample => "lastUploadAttemptEarliestSample",
            DateField::LastAttemptLatestSample => "lastUploadAttemptLatestSample",
        }
    }
}

/// Per-pipeline integer-valued fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountField {
    /// Cumulative confirmed-uploaded samples. Never decreases.
    TotalUploadCount,
    LastAttemptCount,
    TotalDaysHistorical,
    CurrentDayHistorical,
}

impl CountField {
    pub const ALL: [CountField; 4] = [
        CountField::TotalUploadCount,
        CountField::LastAttemptCount,
        CountField::TotalDaysHistorical,
        CountField::CurrentDayHistorical,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CountField::TotalUploadCount => "uploadCount",
            CountField::LastAttemptCount => "lastUploadAttemptCount",
            CountField::TotalDaysHistorical => "totalDaysHistorical",
            CountField::CurrentDayHistorical => "currentDayHistorical",
        }
    }
}

/// Per-pipeline boolean fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagField {
    /// A network task is in flight; survives process death for recovery.
    PendingUploads,
}

impl FlagField {
    pub fn name(self) -> &'static str {
        match self {
            FlagField::PendingUploads => "hasPendingUploads",
        }
    }
}

/// Field name for the persisted query anchor. Anchors get dedicated
/// accessors rather than a field enum; there is exactly one per pipeline.
pub(crate) const ANCHOR_FIELD: &str = "queryAnchor";

/// Interface-wide date fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalDateField {
    /// Boundary between "already backfilled" and "still to fetch".
    HistoricalFence,
    /// Earliest sample time discovered across all kinds.
    HistoricalEarliest,
    /// Where `Current` mode reading starts.
    CurrentStart,
    LastSuccessfulCurrentUpload,
}

impl GlobalDateField {
    pub fn name(self) -> &'static str {
        match self {
            GlobalDateField::HistoricalFence => "historicalFenceDate",
            GlobalDateField::HistoricalEarliest => "historicalEarliestDate",
            GlobalDateField::CurrentStart => "currentStartDate",
            GlobalDateField::LastSuccessfulCurrentUpload => "lastSuccessfulCurrentUploadTime",
        }
    }
}

/// Interface-wide boolean fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalFlagField {
    InterfaceEnabled,
}

impl GlobalFlagField {
    pub fn name(self) -> &'static str {
        match self {
            GlobalFlagField::InterfaceEnabled => "interfaceEnabled",
        }
    }
}

/// Interface-wide string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalStringField {
    /// User the interface is bound to; a mismatch forces a state wipe.
    InterfaceUserId,
    InterfaceUserName,
}

impl GlobalStringField {
    pub fn name(self) -> &'static str {
        match self {
            GlobalStringField::InterfaceUserId => "interfaceUserId",
            GlobalStringField::InterfaceUserName => "interfaceUserName",
        }
    }
}

/// Interface-wide integer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalCountField {
    /// Schema version recorded by the last run; a mismatch wipes all state.
    LastExecutedSchemaVersion,
}

impl GlobalCountField {
    pub fn name(self) -> &'static str {
        match self {
            GlobalCountField::LastExecutedSchemaVersion => "lastExecutedSchemaVersion",
        }
    }
}
