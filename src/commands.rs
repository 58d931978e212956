//! Read-only query commands
//!
//! Commands reach the dispatcher two ways: as tool invocations emitted by the
//! model, and as slash commands typed by the user. Both routes produce the
//! same [`Command`] value.

mod catalog;
mod dispatcher;
mod experience;
mod parse;
mod projects;

pub use catalog::{definitions, tool_names};
pub use dispatcher::Dispatcher;
pub use parse::{is_direct, parse_direct};

use crate::corpus::{CorpusError, DocumentType, EmbeddingType, OtherSubType, ProjectSubType};
use crate::llm::ContentBlock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Who is asking. Direct user commands get a narrower surface than the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    User,
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectQuery {
    List,
    Active,
    Type(ProjectSubType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceQuery {
    List,
    Years,
    Skills,
}

/// One executable query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    DocById {
        doc_id: String,
    },
    Docs {
        doc_type: DocumentType,
    },
    Project {
        query: ProjectQuery,
    },
    Experience {
        query: ExperienceQuery,
    },
    Other {
        subtype: OtherSubType,
    },
    Search {
        query: String,
        embedding_type: EmbeddingType,
    },
    Status,
    /// Direct-only usage listing
    Help,
}

impl Command {
    /// Whether `privilege` may run this command
    pub fn permitted_for(&self, privilege: Privilege) -> bool {
        !matches!((self, privilege), (Command::Search { .. }, Privilege::User))
    }
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("Unknown command: /{0}")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
}

/// Result of running one command
///
/// `success == false` with `data.recoverable == true` asks the orchestrator to
/// hand the conversation to the model instead of giving up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandOutcome {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// Terminal failure
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(json!({ "recoverable": false })),
        }
    }

    /// Failure the model may be able to work around
    pub fn recoverable(message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(json!({ "recoverable": true, "error": error.to_string() })),
        }
    }

    pub fn access_denied(command: &str) -> Self {
        Self {
            success: false,
            message: format!("Access denied: {command} is not available as a direct command."),
            data: Some(json!({ "recoverable": false, "access_denied": true })),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        !self.success
            && self
                .data
                .as_ref()
                .and_then(|d| d.get("recoverable"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "success": self.success,
            "message": self.message,
        });
        if let Some(data) = &self.data {
            value["data"] = data.clone();
        }
        value
    }

    /// Outcome block answering the tool invocation `tool_use_id`
    pub fn to_tool_result(&self, tool_use_id: &str) -> ContentBlock {
        ContentBlock::tool_result(tool_use_id, self.to_value().to_string(), !self.success)
    }
}
