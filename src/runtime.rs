//! Runtime for executing conversation runs
//!
//! One run handles one user input: it is spawned as a task, serialized per
//! session, and reports progress through a [`ProgressSink`].

mod executor;
mod session_lock;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::Orchestrator;
pub use session_lock::SessionLockMap;
pub use traits::*;

use crate::db::DbError;
use crate::state_machine::{StreamEvent, Termination, TransitionError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Runtime over the database with swappable model and command backends
pub type SharedRuntime =
    RuntimeManager<DatabaseStorage, Arc<dyn ModelClient>, Arc<dyn CommandExecutor>>;

/// Shown when a run ends on an internal fault
const INTERNAL_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Receives progress events. Emission never blocks and never fails.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: StreamEvent);
}

impl ProgressSink for mpsc::UnboundedSender<StreamEvent> {
    fn emit(&self, event: StreamEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Progress receiver gone, dropping event");
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Thread store failure: {0}")]
    Store(#[from] DbError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// How a run went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Model turns taken
    pub turns: u32,
    pub turns_remaining: u32,
    pub termination: Termination,
}

/// Handle to a spawned run
pub struct RunHandle {
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
    /// Fires to abort the run
    pub cancel: CancellationToken,
}

/// Spawns runs, one at a time per session
pub struct RuntimeManager<S, M, C> {
    orchestrator: Arc<Orchestrator<S, M, C>>,
    locks: Arc<SessionLockMap>,
}

impl<S, M, C> Clone for RuntimeManager<S, M, C> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S, M, C> RuntimeManager<S, M, C>
where
    S: ThreadStore + 'static,
    M: ModelClient + 'static,
    C: CommandExecutor + 'static,
{
    pub fn new(orchestrator: Orchestrator<S, M, C>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            locks: Arc::new(SessionLockMap::new()),
        }
    }

    pub fn locks(&self) -> &SessionLockMap {
        &self.locks
    }

    /// Start a run for `input`. Events arrive on the returned receiver, which
    /// closes when the run ends.
    pub fn start(&self, session_id: String, input: String) -> RunHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = self.locks.enter(&session_id);
        let cancel = entry.cancel.clone();
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            let _permit = tokio::select! {
                () = entry.cancel.cancelled() => return,
                permit = entry.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!(
                            session_id = %session_id,
                            error = %e,
                            "Could not lock session"
                        );
                        tx.emit(StreamEvent::error(INTERNAL_FAILURE_MESSAGE));
                        return;
                    }
                },
            };

            match orchestrator
                .run(&session_id, &input, &tx, entry.cancel.clone())
                .await
            {
                Ok(summary) => {
                    tracing::debug!(
                        session_id = %session_id,
                        turns = summary.turns,
                        turns_remaining = summary.turns_remaining,
                        termination = ?summary.termination,
                        "Run finished"
                    );
                }
                // Already reported to the client by the executor
                Err(RuntimeError::Store(e)) => {
                    tracing::error!(session_id = %session_id, error = %e, "Run aborted");
                }
                Err(e @ RuntimeError::Transition(_)) => {
                    tracing::error!(session_id = %session_id, error = %e, "Run aborted");
                    tx.emit(StreamEvent::error(INTERNAL_FAILURE_MESSAGE));
                }
            }
        });

        RunHandle { events: rx, cancel }
    }
}
