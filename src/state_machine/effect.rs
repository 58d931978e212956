//! Effects produced by state transitions

use crate::commands::{Command, CommandOutcome};
use crate::llm::{ContentBlock, MessageRole};
use crate::state_machine::state::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    Partial,
    Complete,
    Error,
}

impl StreamEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamEventType::Partial => "partial",
            StreamEventType::Complete => "complete",
            StreamEventType::Error => "error",
        }
    }
}

/// Progress event delivered to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: StreamEventType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl StreamEvent {
    pub fn partial(message: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: StreamEventType::Partial,
            message: message.into(),
            data: Some(data),
            success: None,
        }
    }

    pub fn complete(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            event_type: StreamEventType::Complete,
            message: message.into(),
            data,
            success: Some(true),
        }
    }

    /// Final event for a direct command, mirroring its outcome
    pub fn from_outcome(outcome: &CommandOutcome) -> Self {
        Self {
            event_type: StreamEventType::Complete,
            message: outcome.message.clone(),
            data: outcome.data.clone(),
            success: Some(outcome.success),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            message: message.into(),
            data: None,
            success: Some(false),
        }
    }

    pub fn is_final(&self) -> bool {
        self.event_type != StreamEventType::Partial
    }
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append a message to the thread (subject to coalescing)
    AppendMessage {
        role: MessageRole,
        blocks: Vec<ContentBlock>,
    },

    /// Dispatch a slash command with user privilege
    RunDirect { command: Command },

    /// Send the whole thread to the model
    RequestModel { turn: u32 },

    /// Dispatch one tool invocation with model privilege
    ExecuteCommand { call: ToolCall },

    /// Deliver a progress event
    Stream(StreamEvent),
}

impl Effect {
    pub fn append_user(blocks: Vec<ContentBlock>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::User,
            blocks,
        }
    }

    pub fn append_assistant(blocks: Vec<ContentBlock>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::Assistant,
            blocks,
        }
    }
}
