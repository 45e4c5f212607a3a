//! Service-config double with settable identity and network state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use hksync_core::traits::{BackgroundTaskToken, ServiceConfig};

/// App-side configuration the tests control directly.
pub struct StaticService {
    user_id: Mutex<Option<String>>,
    session_id: Mutex<Option<String>>,
    session_token: Mutex<Option<String>>,
    connected: AtomicBool,
    next_token: AtomicU64,
    begun: AtomicU64,
    ended: AtomicU64,
}

impl Default for StaticService {
    fn default() -> Self {
        Self {
            user_id: Mutex::new(None),
            session_id: Mutex::new(None),
            session_token: Mutex::new(Some("fixture-token".to_string())),
            connected: AtomicBool::new(true),
            next_token: AtomicU64::new(0),
            begun: AtomicU64::new(0),
            ended: AtomicU64::new(0),
        }
    }
}

impl StaticService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ready-to-upload service: logged-in user and an upload session.
    pub fn signed_in(user_id: &str, session_id: &str) -> Self {
        let service = Self::new();
        service.set_user(Some(user_id));
        service.set_session(Some(session_id));
        service
    }

    pub fn set_user(&self, user_id: Option<&str>) {
        *self.user_id.lock().unwrap() = user_id.map(str::to_string);
    }

    pub fn set_session(&self, session_id: Option<&str>) {
        *self.session_id.lock().unwrap() = session_id.map(str::to_string);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_session_token(&self, token: Option<&str>) {
        *self.session_token.lock().unwrap() = token.map(str::to_string);
    }

    /// Background-task brackets opened but not yet closed.
    pub fn open_background_tasks(&self) -> u64 {
        self.begun.load(Ordering::SeqCst) - self.ended.load(Ordering::SeqCst)
    }

    pub fn background_tasks_begun(&self) -> u64 {
        self.begun.load(Ordering::SeqCst)
    }
}

impl ServiceConfig for StaticService {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.lock().unwrap().clone()
    }

    fn upload_session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }

    fn session_token(&self) -> Option<String> {
        self.session_token.lock().unwrap().clone()
    }

    fn is_connected_to_network(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn begin_background_task(&self, _name: &str) -> BackgroundTaskToken {
        self.begun.fetch_add(1, Ordering::SeqCst);
        BackgroundTaskToken(self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    fn end_background_task(&self, _token: BackgroundTaskToken) {
        self.ended.fetch_add(1, Ordering::SeqCst);
    }
}
