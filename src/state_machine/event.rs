//! Events that drive a run

use crate::commands::CommandOutcome;
use crate::llm::{ContentBlock, LlmError};

#[derive(Debug, Clone)]
pub enum Event {
    /// The input that starts the run
    UserInput { text: String },

    /// The direct command finished
    DirectOutcome { outcome: CommandOutcome },

    ModelResponse { content: Vec<ContentBlock> },
    ModelError { error: LlmError },

    /// One tool invocation finished
    CommandComplete {
        tool_use_id: String,
        outcome: CommandOutcome,
    },

    Cancelled,
}
