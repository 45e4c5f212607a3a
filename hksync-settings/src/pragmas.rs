//! PRAGMA configuration applied to the settings connection.
//!
//! WAL mode, NORMAL sync, 5s busy_timeout, foreign_keys ON. Settings volumes
//! are a few rows per batch, so no mmap or cache tuning is applied.

use rusqlite::Connection;

use hksync_core::errors::SyncResult;

use crate::to_settings_err;

/// Apply safety pragmas to a connection.
pub fn apply_pragmas(conn: &Connection) -> SyncResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        ",
    )
    .map_err(|e| to_settings_err(e.to_string()))?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
/// In-memory databases report "memory" and never use WAL.
pub fn verify_wal_mode(conn: &Connection) -> SyncResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_settings_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
