//! # hksync-settings
//!
//! Durable settings for the upload pipeline: query anchors, fence dates,
//! upload stats, and interface flags, in one SQLite table keyed by
//! (scope, field). Scopes partition rows per (kind, mode) pipeline plus one
//! global scope, so independent pipelines never collide on a key.

pub mod pragmas;
pub mod schema;
pub mod store;

pub use schema::{
    CountField, DateField, FlagField, GlobalCountField, GlobalDateField, GlobalFlagField,
    GlobalStringField, SettingScope,
};
pub use store::SettingsStore;

use hksync_core::errors::{SettingsError, SyncError};

/// Wrap a low-level SQLite failure into the workspace error type.
pub(crate) fn to_settings_err(message: String) -> SyncError {
    SyncError::SettingsError(SettingsError::SqliteError { message })
}
