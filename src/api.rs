//! HTTP API for Cogitatio

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::db::Database;
use crate::runtime::SharedRuntime;

/// Header carrying the session id on requests and responses
pub const SESSION_HEADER: &str = "x-session-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub runtime: SharedRuntime,
    pub session_ttl: chrono::Duration,
    pub model_id: String,
}
