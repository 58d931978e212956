//! Per-session single-flight guard
//!
//! Only one run touches a session's thread at a time. A second request for
//! the same session waits until the first run releases its permit. Removing a
//! session cancels every run still holding or waiting on it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
#[error("session lock closed")]
pub struct LockClosed;

struct Slot {
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

/// Each session id maps to a `Semaphore(1)` and a session-wide cancel token
#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Slot>>,
}

/// One run's claim on a session. Keeps the session's slot from being pruned
/// until dropped.
pub struct SessionEntry {
    session_id: String,
    permits: Arc<Semaphore>,
    /// Fires when this run is cancelled or the session is removed
    pub cancel: CancellationToken,
}

impl SessionEntry {
    /// Wait for exclusive access to the session. Released on drop.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, LockClosed> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(permit);
        }
        tracing::debug!(session_id = %self.session_id, "Waiting for in-flight run");
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LockClosed)
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run on `session_id`
    pub fn enter(&self, session_id: &str) -> SessionEntry {
        let mut locks = self.locks.lock();
        let slot = locks.entry(session_id.to_owned()).or_insert_with(|| Slot {
            permits: Arc::new(Semaphore::new(1)),
            cancel: CancellationToken::new(),
        });
        SessionEntry {
            session_id: session_id.to_owned(),
            permits: slot.permits.clone(),
            cancel: slot.cancel.child_token(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop slots no run holds or waits on
    pub fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock();
        let before = locks.len();
        // Entries and permits each hold a clone
        locks.retain(|_, slot| Arc::strong_count(&slot.permits) > 1);
        before - locks.len()
    }

    /// Forget a destroyed session and cancel its runs
    pub fn remove(&self, session_id: &str) {
        if let Some(slot) = self.locks.lock().remove(session_id) {
            slot.cancel.cancel();
        }
    }
}
