//! Thread-level model client
//!
//! Turns a persisted thread into one completion request carrying the system
//! prompt and the command catalog, and normalizes what comes back.

use super::{ContentBlock, LlmError, LlmMessage, LlmRequest, LlmService, MessageRole};
use super::{SystemContent, ToolDefinition, Usage};
use crate::commands;
use crate::db::Message;
use crate::reply;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Stands in for an outcome that was never recorded
const INTERRUPTED_OUTCOME: &str =
    r#"{"success":false,"message":"Interrupted before completion.","data":{"recoverable":true}}"#;

/// One model turn
#[derive(Debug, Clone)]
pub struct ModelReply {
    /// Normalized blocks as returned by the model
    pub content: Vec<ContentBlock>,
    /// User-facing reply extracted from `content`
    pub reply: String,
    pub usage: Usage,
}

pub struct CatalogModelClient {
    service: Arc<dyn LlmService>,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    max_tokens: u32,
}

impl CatalogModelClient {
    pub fn new(service: Arc<dyn LlmService>, system_prompt: impl Into<String>) -> Self {
        Self {
            service,
            system_prompt: system_prompt.into(),
            tools: commands::definitions(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    pub fn build_request(&self, thread: &[Message]) -> LlmRequest {
        LlmRequest {
            system: vec![SystemContent::cached(&self.system_prompt)],
            messages: wire_messages(thread),
            tools: self.tools.clone(),
            max_tokens: Some(self.max_tokens),
        }
    }

    /// One stateless round trip. No retry.
    pub async fn exchange(&self, thread: &[Message]) -> Result<ModelReply, LlmError> {
        let request = self.build_request(thread);
        let response = self.service.complete(&request).await?;

        let content = reply::normalize_blocks(response.content);
        let reply = reply::extract(&content);
        Ok(ModelReply {
            content,
            reply,
            usage: response.usage,
        })
    }
}

/// Provider view of a thread: consecutive same-role messages merged, and
/// invocations left unanswered by an interrupted run given a placeholder
/// outcome so the provider sees complete pairs.
fn wire_messages(thread: &[Message]) -> Vec<LlmMessage> {
    let mut out: Vec<LlmMessage> = Vec::with_capacity(thread.len());
    let mut unanswered: Vec<String> = Vec::new();

    for message in thread {
        let LlmMessage { role, mut content } = message.to_llm_message();

        if role == MessageRole::User && !unanswered.is_empty() {
            let answered: HashSet<&str> = content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                    _ => None,
                })
                .collect();
            let missing: Vec<ContentBlock> = unanswered
                .iter()
                .filter(|id| !answered.contains(id.as_str()))
                .map(|id| ContentBlock::tool_result(id.as_str(), INTERRUPTED_OUTCOME, true))
                .collect();
            if !missing.is_empty() {
                tracing::debug!(count = missing.len(), "Filling unanswered tool invocations");
            }
            // Outcomes lead the user message
            let (results, rest): (Vec<_>, Vec<_>) =
                content.into_iter().partition(ContentBlock::is_tool_result);
            content = missing.into_iter().chain(results).chain(rest).collect();
            unanswered.clear();
        } else if role == MessageRole::Assistant && !unanswered.is_empty() {
            out.push(LlmMessage {
                role: MessageRole::User,
                content: unanswered
                    .drain(..)
                    .map(|id| ContentBlock::tool_result(id, INTERRUPTED_OUTCOME, true))
                    .collect(),
            });
        }

        if role == MessageRole::Assistant {
            unanswered = super::tool_uses(&content)
                .into_iter()
                .map(|(id, _, _)| id.to_string())
                .collect();
        }

        match out.last_mut() {
            Some(last) if last.role == role => last.content.extend(content),
            _ => out.push(LlmMessage { role, content }),
        }
    }

    if !unanswered.is_empty() {
        out.push(LlmMessage {
            role: MessageRole::User,
            content: unanswered
                .into_iter()
                .map(|id| ContentBlock::tool_result(id, INTERRUPTED_OUTCOME, true))
                .collect(),
        });
    }

    out
}
