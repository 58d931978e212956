//! Project listing helpers

use super::experience::is_ongoing;
use crate::corpus::Document;

/// A project is active while its end date is open
pub fn is_active(doc: &Document) -> bool {
    doc.metadata
        .get("date_end")
        .and_then(serde_json::Value::as_str)
        .map_or(true, is_ongoing)
}

pub fn active(docs: Vec<Document>) -> Vec<Document> {
    docs.into_iter().filter(is_active).collect()
}

/// `Title (sub_type, organization, start to end)`
pub fn summary_line(doc: &Document) -> String {
    let mut details: Vec<String> = Vec::new();
    for key in ["sub_type", "organization"] {
        let value = doc.meta_str(key);
        if !value.is_empty() {
            details.push(value.to_string());
        }
    }

    let start = doc.meta_str("date_start");
    if !start.is_empty() {
        let end = doc.meta_str("date_end");
        let end = if is_ongoing(end) { "present" } else { end };
        details.push(format!("{start} to {end}"));
    }

    if details.is_empty() {
        doc.title().to_string()
    } else {
        format!("{} ({})", doc.title(), details.join(", "))
    }
}
