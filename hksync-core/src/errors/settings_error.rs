/// Durable settings-store errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("malformed value for {scope}/{field}: {raw}")]
    MalformedValue {
        scope: String,
        field: String,
        raw: String,
    },

    #[error("settings store lock poisoned")]
    LockPoisoned,
}
