use std::sync::Arc;

use {
    switchboard_dispatch::Dispatcher,
    switchboard_sessions::SessionManager,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, dispatcher: Dispatcher) -> Self {
        Self {
            sessions,
            dispatcher: Arc::new(dispatcher),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
