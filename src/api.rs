//! HTTP and socket API for the transcript chat relay

mod handlers;
mod types;
mod ws;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::relay::{RelayGateway, Room};
use crate::session::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub relay: Arc<RelayGateway>,
}

impl AppState {
    pub fn new(sessions: SessionManager) -> Self {
        let sessions = Arc::new(sessions);
        Self {
            relay: Arc::new(RelayGateway::new(sessions.clone(), Room::new())),
            sessions,
        }
    }
}
