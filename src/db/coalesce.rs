//! Append planning for the thread log
//!
//! Consecutive free-text user input is folded into the trailing user message
//! so the thread keeps strict role alternation. Tool-outcome batches are never
//! merged into, and never merged.

use super::Message;
use crate::llm::{ContentBlock, MessageRole};

/// What an append should do to the log
#[derive(Debug, Clone, PartialEq)]
pub enum AppendPlan {
    /// Insert a new message at the next sequence number
    Insert,
    /// Replace the trailing message's content, keeping its identity
    Merge {
        message_id: String,
        content: Vec<ContentBlock>,
    },
}

/// Free text is user-authored and contains only text blocks
pub fn is_free_text(role: MessageRole, blocks: &[ContentBlock]) -> bool {
    role == MessageRole::User && blocks.iter().all(ContentBlock::is_text)
}

pub fn plan_append(
    trailing: Option<&Message>,
    role: MessageRole,
    blocks: &[ContentBlock],
) -> AppendPlan {
    let Some(last) = trailing else {
        return AppendPlan::Insert;
    };

    if !is_free_text(role, blocks)
        || last.role != MessageRole::User
        || last.is_tool_outcome_batch()
    {
        return AppendPlan::Insert;
    }

    let mut content = last.content.clone();
    content.extend_from_slice(blocks);
    AppendPlan::Merge {
        message_id: last.message_id.clone(),
        content,
    }
}
