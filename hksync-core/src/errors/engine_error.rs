/// Orchestrator-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no upload session id configured; uploads are fenced")]
    MissingUploadSession,

    #[error("no logged-in user; uploads are fenced")]
    MissingUser,

    #[error("engine event channel closed")]
    ChannelClosed,
}
