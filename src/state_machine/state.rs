//! Run state types

use crate::commands::Command;
use crate::llm::ContentBlock;
use serde::Serialize;
use serde_json::Value;

/// Default upper bound on model turns per run
pub const DEFAULT_MAX_TURNS: u32 = 12;

/// A tool invocation emitted by the model, already mapped onto the command
/// set. A mapping failure is kept so the invocation can still be answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub command: Result<Command, String>,
}

impl ToolCall {
    pub fn from_tool_use(id: &str, name: &str, input: &Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            command: Command::from_tool(name, input).map_err(|e| e.to_string()),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Final reply delivered, or a direct command answered
    Completed,
    /// Stopped after the outcomes of the last permitted turn
    TurnLimit,
    /// Model call failed
    Failed,
    /// Client went away
    Cancelled,
}

/// Run state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConvState {
    /// Waiting for the input that starts the run
    #[default]
    Idle,

    /// A slash command is being dispatched
    DirectDispatch { input: String, command: Command },

    /// Waiting for the model's answer for `turn` (1-based)
    ModelTurn { turn: u32 },

    /// Running the model's tool invocations one at a time
    ToolExecuting {
        turn: u32,
        current: ToolCall,
        remaining: Vec<ToolCall>,
        outcomes: Vec<ContentBlock>,
        reply: String,
    },

    Terminated { termination: Termination },
}

impl ConvState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConvState::Terminated { .. })
    }

    pub fn termination(&self) -> Option<Termination> {
        match self {
            ConvState::Terminated { termination } => Some(*termination),
            _ => None,
        }
    }
}

/// Per-run context, fixed for the run's lifetime
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub session_id: String,
    pub max_turns: u32,
}

impl ConvContext {
    pub fn new(session_id: impl Into<String>, max_turns: u32) -> Self {
        Self {
            session_id: session_id.into(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn turns_remaining(&self, turn: u32) -> u32 {
        self.max_turns.saturating_sub(turn)
    }
}
