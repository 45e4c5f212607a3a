pub mod engine_error;
pub mod settings_error;
pub mod store_error;
pub mod upload_error;

pub use engine_error::EngineError;
pub use settings_error::SettingsError;
pub use store_error::StoreError;
pub use upload_error::UploadError;

/// Top-level error for the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("settings error: {0}")]
    SettingsError(#[from] SettingsError),

    #[error("health store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("upload error: {0}")]
    UploadError(#[from] UploadError),

    #[error("engine error: {0}")]
    EngineError(#[from] EngineError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Convenience alias used across the workspace.
pub type SyncResult<T> = Result<T, SyncError>;
