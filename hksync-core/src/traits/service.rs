use std::fmt;

/// Opaque token pairing a begin/end background-task bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskToken(pub u64);

impl fmt::Display for BackgroundTaskToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bg-task-{}", self.0)
    }
}

/// App-side configuration the pipeline consults before and during uploads.
pub trait ServiceConfig: Send + Sync {
    // --- Identity ---
    /// Logged-in user id, if any. Uploads are fenced on this.
    fn current_user_id(&self) -> Option<String>;
    /// Upload session (data-set) id. Uploads are fenced on this too.
    fn upload_session_id(&self) -> Option<String>;
    /// Bearer credential for service requests. A 401 invalidates it until
    /// the app refreshes.
    fn session_token(&self) -> Option<String>;

    // --- Environment ---
    fn is_connected_to_network(&self) -> bool;

    // --- Background budget ---
    /// Open an OS background-task bracket around backgrounded work.
    fn begin_background_task(&self, name: &str) -> BackgroundTaskToken;
    /// Close a bracket opened by `begin_background_task`.
    fn end_background_task(&self, token: BackgroundTaskToken);
}
