//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::commands::{Command, CommandOutcome, Privilege};
use crate::db::{DbResult, Message};
use crate::llm::{ContentBlock, LlmError, MessageRole, ModelReply};
use async_trait::async_trait;

/// Append-only message thread per session
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Append a message, coalescing free text into a trailing user message
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        blocks: &[ContentBlock],
    ) -> DbResult<Message>;

    /// Whole thread, ascending by sequence
    async fn list(&self, session_id: &str) -> DbResult<Vec<Message>>;
}

/// Stateless model round trip over a whole thread
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn exchange(&self, thread: &[Message]) -> Result<ModelReply, LlmError>;
}

/// Runs commands. Never fails: errors come back inside the outcome.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command, privilege: Privilege) -> CommandOutcome;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ThreadStore + ?Sized> ThreadStore for Arc<T> {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        blocks: &[ContentBlock],
    ) -> DbResult<Message> {
        (**self).append(session_id, role, blocks).await
    }

    async fn list(&self, session_id: &str) -> DbResult<Vec<Message>> {
        (**self).list(session_id).await
    }
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn exchange(&self, thread: &[Message]) -> Result<ModelReply, LlmError> {
        (**self).exchange(thread).await
    }
}

#[async_trait]
impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    async fn execute(&self, command: &Command, privilege: Privilege) -> CommandOutcome {
        (**self).execute(command, privilege).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::commands::Dispatcher;
use crate::corpus::DocumentService;
use crate::db::Database;
use crate::llm::CatalogModelClient;
use std::sync::Arc;

/// Adapter to use Database as a `ThreadStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThreadStore for DatabaseStorage {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        blocks: &[ContentBlock],
    ) -> DbResult<Message> {
        self.db.append_message(session_id, role, blocks)
    }

    async fn list(&self, session_id: &str) -> DbResult<Vec<Message>> {
        self.db.get_messages(session_id)
    }
}

#[async_trait]
impl ModelClient for CatalogModelClient {
    async fn exchange(&self, thread: &[Message]) -> Result<ModelReply, LlmError> {
        CatalogModelClient::exchange(self, thread).await
    }
}

#[async_trait]
impl<D: DocumentService> CommandExecutor for Dispatcher<D> {
    async fn execute(&self, command: &Command, privilege: Privilege) -> CommandOutcome {
        Dispatcher::execute(self, command, privilege).await
    }
}
