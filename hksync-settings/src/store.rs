//! SettingsStore owns the SQLite connection, the typed get/set per field
//! class, and the reset groups the engine invokes on disable, user switch,
//! and schema migration.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use hksync_core::errors::{SettingsError, SyncResult};
use hksync_core::types::{PipelineKey, QueryAnchor};

use crate::pragmas;
use crate::schema::{
    CountField, DateField, FlagField, GlobalCountField, GlobalDateField, GlobalFlagField,
    GlobalStringField, SettingScope, ANCHOR_FIELD,
};
use crate::to_settings_err;

/// Durable settings store. All access goes through one mutex-guarded
/// connection; writes are a handful of rows per upload round.
pub struct SettingsStore {
    conn: Mutex<Connection>,
}

impl SettingsStore {
    /// Open a settings store backed by a file on disk.
    pub fn open(path: &Path) -> SyncResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_settings_err(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory settings store (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_settings_err(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> SyncResult<()> {
        self.with_conn(|conn| {
            pragmas::apply_pragmas(conn)?;
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS settings (
                    scope TEXT NOT NULL,
                    field TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (scope, field)
                );
                ",
            )
            .map_err(|e| to_settings_err(e.to_string()))?;
            Ok(())
        })
    }

    fn with_conn<F, T>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&Connection) -> SyncResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| SettingsError::LockPoisoned)?;
        f(&conn)
    }

    // --- Raw rows ---

    fn get_raw(&self, scope: SettingScope, field: &str) -> SyncResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE scope = ?1 AND field = ?2",
                params![scope.to_string(), field],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| to_settings_err(e.to_string()))
        })
    }

    fn set_raw(&self, scope: SettingScope, field: &str, value: &str) -> SyncResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (scope, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (scope, field) DO UPDATE SET value = excluded.value",
                params![scope.to_string(), field, value],
            )
            .map_err(|e| to_settings_err(e.to_string()))?;
            Ok(())
        })
    }

    fn delete_raw(&self, scope: SettingScope, field: &str) -> SyncResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM settings WHERE scope = ?1 AND field = ?2",
                params![scope.to_string(), field],
            )
            .map_err(|e| to_settings_err(e.to_string()))?;
            Ok(())
        })
    }

    // --- Encodings ---

    fn encode_date(value: DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn decode_date(scope: SettingScope, field: &str, raw: &str) -> SyncResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| {
                SettingsError::MalformedValue {
                    scope: scope.to_string(),
                    field: field.to_string(),
                    raw: raw.to_string(),
                }
                .into()
            })
    }

    fn decode_u64(scope: SettingScope, field: &str, raw: &str) -> SyncResult<u64> {
        raw.parse().map_err(|_| {
            SettingsError::MalformedValue {
                scope: scope.to_string(),
                field: field.to_string(),
                raw: raw.to_string(),
            }
            .into()
        })
    }

    fn decode_bool(scope: SettingScope, field: &str, raw: &str) -> SyncResult<bool> {
        raw.parse().map_err(|_| {
            SettingsError::MalformedValue {
                scope: scope.to_string(),
                field: field.to_string(),
                raw: raw.to_string(),
            }
            .into()
        })
    }

    // --- Per-pipeline fields ---

    pub fn date(&self, key: PipelineKey, field: DateField) -> SyncResult<Option<DateTime<Utc>>> {
        let scope = SettingScope::Pipeline(key);
        match self.get_raw(scope, field.name())? {
            Some(raw) => Ok(Some(Self::decode_date(scope, field.name(), &raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_date(
        &self,
        key: PipelineKey,
        field: DateField,
        value: DateTime<Utc>,
    ) -> SyncResult<()> {
        self.set_raw(
            SettingScope::Pipeline(key),
            field.name(),
            &Self::encode_date(value),
        )
    }

    pub fn clear_date(&self, key: PipelineKey, field: DateField) -> SyncResult<()> {
        self.delete_raw(SettingScope::Pipeline(key), field.name())
    }

    /// Counts default to zero when the row is absent.
    pub fn count(&self, key: PipelineKey, field: CountField) -> SyncResult<u64> {
        let scope = SettingScope::Pipeline(key);
        match self.get_raw(scope, field.name())? {
            Some(raw) => Self::decode_u64(scope, field.name(), &raw),
            None => Ok(0),
        }
    }

    pub fn set_count(&self, key: PipelineKey, field: CountField, value: u64) -> SyncResult<()> {
        self.set_raw(
            SettingScope::Pipeline(key),
            field.name(),
            &value.to_string(),
        )
    }

    /// Flags default to false when the row is absent.
    pub fn flag(&self, key: PipelineKey, field: FlagField) -> SyncResult<bool> {
        let scope = SettingScope::Pipeline(key);
        match self.get_raw(scope, field.name())? {
            Some(raw) => Self::decode_bool(scope, field.name(), &raw),
            None => Ok(false),
        }
    }

    pub fn set_flag(&self, key: PipelineKey, field: FlagField, value: bool) -> SyncResult<()> {
        self.set_raw(
            SettingScope::Pipeline(key),
            field.name(),
            &value.to_string(),
        )
    }

    pub fn anchor(&self, key: PipelineKey) -> SyncResult<Option<QueryAnchor>> {
        Ok(self
            .get_raw(SettingScope::Pipeline(key), ANCHOR_FIELD)?
            .map(QueryAnchor::new))
    }

    pub fn set_anchor(&self, key: PipelineKey, anchor: &QueryAnchor) -> SyncResult<()> {
        self.set_raw(SettingScope::Pipeline(key), ANCHOR_FIELD, anchor.as_str())
    }

    pub fn clear_anchor(&self, key: PipelineKey) -> SyncResult<()> {
        self.delete_raw(SettingScope::Pipeline(key), ANCHOR_FIELD)
    }

    // --- Global fields ---

    pub fn global_date(&self, field: GlobalDateField) -> SyncResult<Option<DateTime<Utc>>> {
        match self.get_raw(SettingScope::Global, field.name())? {
            Some(raw) => Ok(Some(Self::decode_date(
                SettingScope::Global,
                field.name(),
                &raw,
            )?)),
            None => Ok(None),
        }
    }

    pub fn set_global_date(&self, field: GlobalDateField, value: DateTime<Utc>) -> SyncResult<()> {
        self.set_raw(SettingScope::Global, field.name(), &Self::encode_date(value))
    }

    pub fn clear_global_date(&self, field: GlobalDateField) -> SyncResult<()> {
        self.delete_raw(SettingScope::Global, field.name())
    }

    pub fn global_flag(&self, field: GlobalFlagField) -> SyncResult<bool> {
        match self.get_raw(SettingScope::Global, field.name())? {
            Some(raw) => Self::decode_bool(SettingScope::Global, field.name(), &raw),
            None => Ok(false),
        }
    }

    pub fn set_global_flag(&self, field: GlobalFlagField, value: bool) -> SyncResult<()> {
        self.set_raw(SettingScope::Global, field.name(), &value.to_string())
    }

    pub fn global_string(&self, field: GlobalStringField) -> SyncResult<Option<String>> {
        self.get_raw(SettingScope::Global, field.name())
    }

    pub fn set_global_string(&self, field: GlobalStringField, value: &str) -> SyncResult<()> {
        self.set_raw(SettingScope::Global, field.name(), value)
    }

    pub fn clear_global_string(&self, field: GlobalStringField) -> SyncResult<()> {
        self.delete_raw(SettingScope::Global, field.name())
    }

    /// Absent rows yield `None` so first runs are distinguishable from zero.
    pub fn global_count(&self, field: GlobalCountField) -> SyncResult<Option<u64>> {
        match self.get_raw(SettingScope::Global, field.name())? {
            Some(raw) => Ok(Some(Self::decode_u64(
                SettingScope::Global,
                field.name(),
                &raw,
            )?)),
            None => Ok(None),
        }
    }

    pub fn set_global_count(&self, field: GlobalCountField, value: u64) -> SyncResult<()> {
        self.set_raw(SettingScope::Global, field.name(), &value.to_string())
    }

    // --- Reset groups ---

    /// Clear the reader's cursor state: anchor and query range.
    pub fn reset_reader_state(&self, key: PipelineKey) -> SyncResult<()> {
        debug!(pipeline = %key, "settings: resetting reader state");
        self.clear_anchor(key)?;
        self.clear_date(key, DateField::QueryStart)?;
        self.clear_date(key, DateField::QueryEnd)?;
        Ok(())
    }

    /// Clear every attempt/success/counter field for one pipeline.
    pub fn reset_stats(&self, key: PipelineKey) -> SyncResult<()> {
        debug!(pipeline = %key, "settings: resetting stats");
        for field in DateField::ALL {
            if !matches!(field, DateField::QueryStart | DateField::QueryEnd) {
                self.clear_date(key, field)?;
            }
        }
        for field in CountField::ALL {
            self.delete_raw(SettingScope::Pipeline(key), field.name())?;
        }
        Ok(())
    }

    /// Reader state, stats, and the pending flag for one pipeline.
    pub fn reset_pipeline(&self, key: PipelineKey) -> SyncResult<()> {
        self.reset_reader_state(key)?;
        self.reset_stats(key)?;
        self.delete_raw(SettingScope::Pipeline(key), FlagField::PendingUploads.name())
    }

    /// Clear the historical fence and earliest-discovered date.
    pub fn reset_historical_globals(&self) -> SyncResult<()> {
        self.clear_global_date(GlobalDateField::HistoricalFence)?;
        self.clear_global_date(GlobalDateField::HistoricalEarliest)?;
        Ok(())
    }

    /// Clear the current-mode start date and last-success time.
    pub fn reset_current_globals(&self) -> SyncResult<()> {
        self.clear_global_date(GlobalDateField::CurrentStart)?;
        self.clear_global_date(GlobalDateField::LastSuccessfulCurrentUpload)?;
        Ok(())
    }

    /// Clear the user binding and the enabled flag.
    pub fn reset_user_globals(&self) -> SyncResult<()> {
        self.delete_raw(
            SettingScope::Global,
            GlobalFlagField::InterfaceEnabled.name(),
        )?;
        self.clear_global_string(GlobalStringField::InterfaceUserId)?;
        self.clear_global_string(GlobalStringField::InterfaceUserName)?;
        Ok(())
    }

    /// Remove every row. Used by the schema-version migration.
    pub fn wipe_all(&self) -> SyncResult<()> {
        debug!("settings: wiping all persisted state");
        self.with_conn(|conn| {
            conn.execute("DELETE FROM settings", [])
                .map_err(|e| to_settings_err(e.to_string()))?;
            Ok(())
        })
    }
}
