//! System prompt for the model
//!
//! A built-in prompt describes the reply format and the available lookups.
//! `COGITATIO_SYSTEM_PROMPT_PATH` can replace it wholesale.

use crate::commands::tool_names;
use crate::reply::{CLOSE, OPEN};
use std::fmt::Write;
use std::path::Path;

const BASE_PROMPT: &str = r"You answer questions about one person's professional background: their experience, education, projects and other writing. Everything you know comes from a document service you can query with the tools provided.

Look things up before answering. Prefer a specific document over a broad listing when you know its id, and use vector search for open-ended questions. If a lookup fails, say so plainly and answer from what you already have.

Keep answers short and factual. Do not invent roles, dates or skills that the documents do not mention.";

/// Build the built-in prompt
pub fn build_system_prompt() -> String {
    let mut prompt = BASE_PROMPT.to_string();
    let _ = write!(
        prompt,
        "\n\nWrap everything meant for the user in {OPEN} and {CLOSE}. Text outside those tags is never shown. When you call a tool, still include a short {OPEN}...{CLOSE} line saying what you are checking."
    );
    let _ = write!(prompt, "\n\nAvailable tools: {}.", tool_names().join(", "));
    prompt
}

/// The override at `path` if given, else the built-in prompt
pub fn load_system_prompt(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path)?;
            tracing::info!(
                path = %path.display(),
                chars = prompt.len(),
                "Loaded system prompt override"
            );
            Ok(prompt)
        }
        None => Ok(build_system_prompt()),
    }
}
