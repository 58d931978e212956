//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::ProgressSink;
use crate::commands::{Command, CommandOutcome, Privilege};
use crate::corpus::{
    CorpusError, CorpusResult, DocumentChunk, DocumentService, DocumentType, Health, SearchHit,
    SearchRequest, Stats, TypeFilter,
};
use crate::db::{plan_append, AppendPlan, DbError, DbResult, Message};
use crate::llm::{ContentBlock, LlmError, MessageRole, ModelReply, Usage};
use crate::reply;
use crate::state_machine::StreamEvent;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

// ============================================================================
// Mock Model Client
// ============================================================================

enum Scripted {
    Reply(Vec<ContentBlock>),
    Error(LlmError),
    /// Never answers; only cancellation ends the call
    Hang,
}

/// Model client that plays back queued responses
#[derive(Default)]
pub struct MockModelClient {
    script: Mutex<VecDeque<Scripted>>,
    /// Thread seen by each call
    pub threads: Mutex<Vec<Vec<Message>>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, content: Vec<ContentBlock>) {
        self.script.lock().push_back(Scripted::Reply(content));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.script.lock().push_back(Scripted::Error(error));
    }

    pub fn queue_hang(&self) {
        self.script.lock().push_back(Scripted::Hang);
    }

    pub fn call_count(&self) -> usize {
        self.threads.lock().len()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn exchange(&self, thread: &[Message]) -> Result<ModelReply, LlmError> {
        self.threads.lock().push(thread.to_vec());
        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Reply(content)) => {
                let content = reply::normalize_blocks(content);
                let reply = reply::extract(&content);
                Ok(ModelReply {
                    content,
                    reply,
                    usage: Usage::default(),
                })
            }
            Some(Scripted::Error(e)) => Err(e),
            Some(Scripted::Hang) => futures::future::pending().await,
            None => Err(LlmError::unknown("no response queued")),
        }
    }
}

// ============================================================================
// Mock Command Executor
// ============================================================================

/// Records every command; answers from per-tool overrides or with success
#[derive(Default)]
pub struct MockCommandExecutor {
    overrides: Mutex<HashMap<&'static str, CommandOutcome>>,
    pub calls: Mutex<Vec<(Command, Privilege)>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, tool: &'static str, outcome: CommandOutcome) {
        self.overrides.lock().insert(tool, outcome);
    }
}

#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn execute(&self, command: &Command, privilege: Privilege) -> CommandOutcome {
        self.calls.lock().push((command.clone(), privilege));
        let name = command.tool_name();
        self.overrides
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| CommandOutcome::success(format!("ran {name}"), None))
    }
}

// ============================================================================
// In-Memory Thread Store
// ============================================================================

/// Thread store with the same coalescing rule as the database
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: Mutex<HashMap<String, Vec<Message>>>,
    fail_appends: AtomicBool,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self) {
        self.fail_appends.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.threads
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        blocks: &[ContentBlock],
    ) -> DbResult<Message> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DbError::SessionNotFound(session_id.to_string()));
        }
        if blocks.is_empty() {
            return Err(DbError::EmptyContent);
        }

        let mut threads = self.threads.lock();
        let thread = threads.entry(session_id.to_string()).or_default();

        match plan_append(thread.last(), role, blocks) {
            AppendPlan::Merge { content, .. } => {
                let last = thread.last_mut().ok_or(DbError::EmptyContent)?;
                last.content = content;
                Ok(last.clone())
            }
            AppendPlan::Insert => {
                let sequence_id = thread.last().map_or(1, |m| m.sequence_id + 1);
                let message = Message {
                    message_id: uuid::Uuid::new_v4().to_string(),
                    session_id: session_id.to_string(),
                    sequence_id,
                    role,
                    content: blocks.to_vec(),
                    created_at: Utc::now(),
                };
                thread.push(message.clone());
                Ok(message)
            }
        }
    }

    async fn list(&self, session_id: &str) -> DbResult<Vec<Message>> {
        Ok(self.messages(session_id))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Sink that keeps everything it is given
#[derive(Default)]
pub struct CollectingSink {
    pub events: Mutex<Vec<StreamEvent>>,
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: StreamEvent) {
        self.events.lock().push(event);
    }
}

/// Formatted log output, for asserting on what a run reports
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route `WARN` and above on this thread into the capture until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Document service that is either fully up or unreachable
pub struct StaticCorpus {
    pub healthy: bool,
}

impl StaticCorpus {
    fn check(&self) -> CorpusResult<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(CorpusError::Network("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl DocumentService for StaticCorpus {
    async fn health(&self) -> CorpusResult<Health> {
        self.check()?;
        Ok(Health {
            status: "healthy".to_string(),
        })
    }

    async fn stats(&self) -> CorpusResult<Stats> {
        self.check()?;
        Ok(Stats {
            total_vectors: 42,
            total_documents: 7,
            vectors_in_metadata: 42,
            dimension: 384,
            index_size_mb: 0.1,
        })
    }

    async fn document(&self, doc_id: &str) -> CorpusResult<Vec<DocumentChunk>> {
        self.check()?;
        Ok(vec![DocumentChunk {
            doc_id: doc_id.to_string(),
            chunk_id: format!("{doc_id}_0"),
            total_chunks: 1,
            content: "Built the ingest pipeline.".to_string(),
            metadata: serde_json::json!({"title": "Ingest"}),
        }])
    }

    async fn documents_by_type(
        &self,
        _doc_type: DocumentType,
        _filter: TypeFilter,
    ) -> CorpusResult<Vec<DocumentChunk>> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn search(&self, _request: &SearchRequest) -> CorpusResult<Vec<SearchHit>> {
        self.check()?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Dispatcher;
    use crate::runtime::{Orchestrator, RuntimeManager};
    use crate::state_machine::effect::StreamEventType;
    use crate::state_machine::Termination;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    type TestOrchestrator =
        Orchestrator<Arc<InMemoryThreadStore>, Arc<MockModelClient>, Arc<MockCommandExecutor>>;

    struct Harness {
        store: Arc<InMemoryThreadStore>,
        model: Arc<MockModelClient>,
        commands: Arc<MockCommandExecutor>,
        orchestrator: TestOrchestrator,
    }

    fn harness(max_turns: u32) -> Harness {
        let store = Arc::new(InMemoryThreadStore::new());
        let model = Arc::new(MockModelClient::new());
        let commands = Arc::new(MockCommandExecutor::new());
        let orchestrator =
            Orchestrator::new(store.clone(), model.clone(), commands.clone(), max_turns);
        Harness {
            store,
            model,
            commands,
            orchestrator,
        }
    }

    fn tool_call_response(turn: u32) -> Vec<ContentBlock> {
        vec![
            ContentBlock::text(format!("<response>Checking, step {turn}</response>")),
            ContentBlock::tool_use(format!("t{turn}"), "status_command", json!({})),
        ]
    }

    fn result_ids(message: &Message) -> Vec<&str> {
        message
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_in_memory_store_coalesces() {
        let store = InMemoryThreadStore::new();
        store
            .append("s", MessageRole::User, &[ContentBlock::text("a")])
            .await
            .unwrap();
        let merged = store
            .append("s", MessageRole::User, &[ContentBlock::text("b")])
            .await
            .unwrap();
        assert_eq!(merged.sequence_id, 1);
        assert_eq!(merged.content.len(), 2);

        let result = ContentBlock::tool_result("x", "{}", false);
        store
            .append("s", MessageRole::User, &[result])
            .await
            .unwrap();
        let thread = store.list("s").await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(thread[1].is_tool_outcome_batch());
    }

    /// `/status` against a healthy backend answers directly
    #[tokio::test]
    async fn test_scenario_a_status_without_model() {
        let store = Arc::new(InMemoryThreadStore::new());
        let model = Arc::new(MockModelClient::new());
        let dispatcher = Dispatcher::new(StaticCorpus { healthy: true }, 3);
        let orchestrator = Orchestrator::new(store.clone(), model.clone(), dispatcher, 12);
        let sink = CollectingSink::default();

        let summary = orchestrator
            .run("s1", "/status", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(summary.turns, 0);
        assert_eq!(model.call_count(), 0);

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, StreamEventType::Complete);
        assert_eq!(events[0].success, Some(true));
        assert_eq!(events[0].message, "All systems operational.");

        let thread = store.messages("s1");
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].role, MessageRole::User);
        assert_eq!(thread[0].content[0], ContentBlock::text("/status"));
    }

    /// Plain text gets one model turn and a complete event
    #[tokio::test]
    async fn test_scenario_b_single_turn() {
        let h = harness(12);
        h.model
            .queue_response(vec![ContentBlock::text("<response>Hello!</response>")]);
        let sink = CollectingSink::default();

        let summary = h
            .orchestrator
            .run("s1", "hello", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(summary.turns, 1);
        assert_eq!(summary.turns_remaining, 11);
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(
            h.model.threads.lock()[0][0].content,
            vec![ContentBlock::text("hello")]
        );

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, StreamEventType::Complete);
        assert_eq!(events[0].message, "Hello!");

        let thread = h.store.messages("s1");
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[1].role, MessageRole::Assistant);
    }

    /// Two invocations in one turn produce one outcome message, in order
    #[tokio::test]
    async fn test_scenario_c_outcomes_batched() {
        let h = harness(12);
        h.model.queue_response(vec![
            ContentBlock::text("<response>Let me look.</response>"),
            ContentBlock::tool_use("a", "doc_id_command", json!({"doc_id": "ingest"})),
            ContentBlock::tool_use("b", "status_command", json!({})),
        ]);
        h.model
            .queue_response(vec![ContentBlock::text("<response>Done.</response>")]);
        let sink = CollectingSink::default();

        let summary = h
            .orchestrator
            .run(
                "s1",
                "tell me about ingest",
                &sink,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.turns, 2);

        let thread = h.store.messages("s1");
        assert_eq!(thread.len(), 4);
        assert!(thread[2].is_tool_outcome_batch());
        assert_eq!(result_ids(&thread[2]), vec!["a", "b"]);

        let calls = h.commands.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, p)| *p == Privilege::Model));
        assert_eq!(
            calls[0].0,
            Command::DocById {
                doc_id: "ingest".to_string()
            }
        );

        let events = sink.events.lock();
        assert_eq!(events[0].event_type, StreamEventType::Partial);
        assert_eq!(events[0].data.as_ref().unwrap()["turn"], 1);
        assert_eq!(events[1].message, "Done.");
        assert!(events[1].is_final());
    }

    /// A reply missing its close delimiter is repaired before persisting
    #[tokio::test]
    async fn test_scenario_d_missing_close_repaired() {
        let h = harness(12);
        h.model
            .queue_response(vec![ContentBlock::text("<response>Half an answer")]);
        let sink = CollectingSink::default();

        h.orchestrator
            .run("s1", "hi", &sink, CancellationToken::new())
            .await
            .unwrap();

        let thread = h.store.messages("s1");
        assert_eq!(
            thread[1].content,
            vec![ContentBlock::text("<response>Half an answer</response>")]
        );
        assert_eq!(sink.events.lock()[0].message, "Half an answer");
    }

    /// A model that never stops invoking tools is cut off after the limit
    #[tokio::test]
    async fn test_scenario_e_turn_limit() {
        let h = harness(12);
        for turn in 1..=13 {
            h.model.queue_response(tool_call_response(turn));
        }
        let sink = CollectingSink::default();
        let logs = LogCapture::default();
        let _guard = logs.install();

        let summary = h
            .orchestrator
            .run("s1", "loop forever", &sink, CancellationToken::new())
            .await
            .unwrap();

        let warnings = logs.contents();
        assert!(warnings.contains("WARN"), "{warnings}");
        assert!(warnings.contains("Turn limit reached"), "{warnings}");

        assert_eq!(summary.termination, Termination::TurnLimit);
        assert_eq!(summary.turns, 12);
        assert_eq!(summary.turns_remaining, 0);
        assert_eq!(h.model.call_count(), 12);

        let events = sink.events.lock();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, StreamEventType::Complete);
        assert_eq!(last.message, "Checking, step 12");
        assert_eq!(last.data.as_ref().unwrap()["turn_limit_reached"], true);

        // Outcomes of the last turn are persisted
        let thread = h.store.messages("s1");
        assert_eq!(thread.len(), 1 + 12 * 2);
        assert_eq!(result_ids(thread.last().unwrap()), vec!["t12"]);
    }

    #[tokio::test]
    async fn test_recoverable_direct_failure_falls_back() {
        let store = Arc::new(InMemoryThreadStore::new());
        let model = Arc::new(MockModelClient::new());
        model.queue_response(vec![ContentBlock::text(
            "<response>The document service is down right now.</response>",
        )]);
        let dispatcher = Dispatcher::new(StaticCorpus { healthy: false }, 3);
        let orchestrator = Orchestrator::new(store.clone(), model.clone(), dispatcher, 12);
        let sink = CollectingSink::default();

        let summary = orchestrator
            .run("s1", "/status", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(model.call_count(), 1);

        let thread = store.messages("s1");
        assert_eq!(thread.len(), 3);
        assert_eq!(thread[0].role, MessageRole::User);
        assert_eq!(thread[1].role, MessageRole::Assistant);

        let events = sink.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, StreamEventType::Partial);
        assert_eq!(events[1].message, "The document service is down right now.");
    }

    #[tokio::test]
    async fn test_search_denied_as_direct_command() {
        let h = harness(12);
        h.commands.answer(
            "search_vector_database",
            CommandOutcome::access_denied("search_vector_database"),
        );
        let sink = CollectingSink::default();

        let summary = h
            .orchestrator
            .run("s1", "/search rust", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(h.model.call_count(), 0);
        assert_eq!(h.commands.calls.lock()[0].1, Privilege::User);
        assert_eq!(sink.events.lock()[0].success, Some(false));
    }

    #[tokio::test]
    async fn test_unknown_tool_answered_with_failure() {
        let h = harness(12);
        h.model.queue_response(vec![ContentBlock::tool_use(
            "x",
            "delete_everything",
            json!({}),
        )]);
        h.model
            .queue_response(vec![ContentBlock::text("<response>Sorry.</response>")]);
        let sink = CollectingSink::default();

        h.orchestrator
            .run("s1", "hi", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(h.commands.calls.lock().is_empty());
        let thread = h.store.messages("s1");
        let ContentBlock::ToolResult {
            tool_use_id,
            is_error,
            content,
        } = &thread[2].content[0]
        else {
            panic!("expected tool result");
        };
        assert_eq!(tool_use_id, "x");
        assert!(*is_error);
        assert!(content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_model_failure_streams_error_and_keeps_input() {
        let h = harness(12);
        h.model.queue_error(LlmError::rate_limit("slow down"));
        let sink = CollectingSink::default();

        let summary = h
            .orchestrator
            .run("s1", "hello", &sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Failed);
        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, StreamEventType::Error);

        // The next input coalesces into the unanswered one
        drop(events);
        h.model
            .queue_response(vec![ContentBlock::text("<response>Hi</response>")]);
        h.orchestrator
            .run(
                "s1",
                "anyone?",
                &CollectingSink::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let thread = h.store.messages("s1");
        assert_eq!(thread.len(), 2);
        assert_eq!(
            thread[0].content,
            vec![ContentBlock::text("hello"), ContentBlock::text("anyone?")]
        );
    }

    #[tokio::test]
    async fn test_store_failure_emits_error() {
        let h = harness(12);
        h.store.fail_appends();
        let sink = CollectingSink::default();

        let result = h
            .orchestrator
            .run("s1", "hello", &sink, CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(crate::runtime::RuntimeError::Store(_))
        ));
        assert_eq!(h.model.call_count(), 0);
        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, StreamEventType::Error);
    }

    #[tokio::test]
    async fn test_cancel_aborts_model_call() {
        let h = harness(12);
        h.model.queue_hang();
        let sink = CollectingSink::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let summary = h
            .orchestrator
            .run("s1", "hello", &sink, cancel)
            .await
            .unwrap();

        assert_eq!(summary.termination, Termination::Cancelled);
        assert!(sink.events.lock().is_empty());
        // Nothing rolled back
        assert_eq!(h.store.messages("s1").len(), 1);
    }

    #[tokio::test]
    async fn test_manager_serializes_runs_per_session() {
        let h = harness(12);
        h.model.queue_hang();
        h.model
            .queue_response(vec![ContentBlock::text("<response>second</response>")]);
        let manager = RuntimeManager::new(h.orchestrator);

        let first = manager.start("s1".to_string(), "first".to_string());
        let mut second = manager.start("s1".to_string(), "second".to_string());

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        // Second run is still queued behind the hung first one
        assert_eq!(h.model.call_count(), 1);

        first.cancel.cancel();
        let event = second.events.recv().await.unwrap();
        assert_eq!(event.message, "second");
        assert!(second.events.recv().await.is_none());
        assert_eq!(h.model.call_count(), 2);
    }
}
