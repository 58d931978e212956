//! Reply delimiter handling
//!
//! The model wraps user-facing prose in `<response>` … `</response>`. Output
//! that drops one side of the pair is repaired locally, never re-requested.

use crate::llm::ContentBlock;

pub const OPEN: &str = "<response>";
pub const CLOSE: &str = "</response>";

/// Shown when a model turn produced no delimited reply
pub const PLACEHOLDER_REPLY: &str = "Still working on that, one moment.";

const PROCESSING_TEXT: &str = "Processing your request...";

/// Balance delimiters in `text`.
///
/// A close with no pending open gets an open right after the previous close
/// (or at the start). An open still pending at the next open, or at the end,
/// is closed there. Idempotent.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + OPEN.len() + CLOSE.len());
    let mut rest = text;
    let mut pending_open = false;
    // Where a missing open would have to go
    let mut boundary = 0;

    loop {
        let next_open = rest.find(OPEN);
        let next_close = rest.find(CLOSE);

        let (idx, is_open) = match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => (o, true),
            (_, Some(c)) => (c, false),
            (Some(o), None) => (o, true),
            (None, None) => break,
        };

        let (before, after) = rest.split_at(idx);
        out.push_str(before);

        if is_open {
            if pending_open {
                out.push_str(CLOSE);
            }
            out.push_str(OPEN);
            pending_open = true;
            rest = after.strip_prefix(OPEN).unwrap_or(after);
        } else {
            if !pending_open {
                out.insert_str(boundary, OPEN);
            }
            out.push_str(CLOSE);
            pending_open = false;
            boundary = out.len();
            rest = after.strip_prefix(CLOSE).unwrap_or(after);
        }
    }

    out.push_str(rest);
    if pending_open {
        out.push_str(CLOSE);
    }
    out
}

/// Normalize every text block, leaving other blocks untouched
pub fn normalize_blocks(blocks: Vec<ContentBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .map(|block| match block {
            ContentBlock::Text { text } => ContentBlock::Text {
                text: normalize(&text),
            },
            other => other,
        })
        .collect()
}

/// All delimited spans across text blocks, trimmed, joined by a blank line.
/// `None` when no non-empty span exists.
pub fn find_reply(blocks: &[ContentBlock]) -> Option<String> {
    let mut spans = Vec::new();

    for block in blocks {
        let ContentBlock::Text { text } = block else {
            continue;
        };
        let mut rest = text.as_str();
        while let Some(start) = rest.find(OPEN) {
            let (_, tail) = rest.split_at(start + OPEN.len());
            let Some(end) = tail.find(CLOSE) else {
                break;
            };
            let (span, remainder) = tail.split_at(end);
            let span = span.trim();
            if !span.is_empty() {
                spans.push(span.to_string());
            }
            rest = remainder.strip_prefix(CLOSE).unwrap_or(remainder);
        }
    }

    if spans.is_empty() {
        None
    } else {
        Some(spans.join("\n\n"))
    }
}

/// Like [`find_reply`], falling back to the placeholder
pub fn extract(blocks: &[ContentBlock]) -> String {
    find_reply(blocks).unwrap_or_else(|| PLACEHOLDER_REPLY.to_string())
}

/// Synthetic block appended when a model turn carries no reply
pub fn processing_block() -> ContentBlock {
    ContentBlock::text(format!("{OPEN}{PROCESSING_TEXT}{CLOSE}"))
}
