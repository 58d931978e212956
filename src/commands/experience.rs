//! Aggregations over experience documents

use crate::corpus::Document;
use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Years outside this range are treated as unparseable
const YEARS: RangeInclusive<i32> = 1900..=2200;

/// Month index (`year * 12 + month - 1`), inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Span {
    start: i32,
    end: i32,
}

impl Span {
    fn len(self) -> i32 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }
}

/// End dates meaning "ongoing"
pub fn is_ongoing(date_end: &str) -> bool {
    let d = date_end.trim();
    d.is_empty() || d.eq_ignore_ascii_case("present") || d.eq_ignore_ascii_case("current")
}

/// Parse `YYYY` or `YYYY-MM` (extra `-DD` ignored). A bare year covers the
/// whole year: January when used as a start, December as an end.
fn month_index(date: &str, is_end: bool) -> Option<i32> {
    let mut parts = date.trim().split('-');
    let year: i32 = parts
        .next()?
        .trim()
        .parse()
        .ok()
        .filter(|y| YEARS.contains(y))?;
    let month: i32 = match parts.next() {
        Some(m) => m.trim().parse().ok().filter(|m| (1..=12).contains(m))?,
        None if is_end => 12,
        None => 1,
    };
    year.checked_mul(12)?.checked_add(month - 1)
}

fn span(doc: &Document, today: NaiveDate) -> Option<Span> {
    let start = month_index(doc.meta_str("date_start"), false)?;
    let end_raw = doc.meta_str("date_end");
    let end = if is_ongoing(end_raw) {
        today
            .year()
            .checked_mul(12)?
            .checked_add(i32::try_from(today.month0()).ok()?)?
    } else {
        month_index(end_raw, true)?
    };
    (end >= start).then_some(Span { start, end })
}

/// Total experience in years, counting overlapping roles once
#[derive(Debug, Clone, PartialEq)]
pub struct YearsSummary {
    pub years: f64,
    pub months: i32,
    pub roles: usize,
    pub unparsed: Vec<String>,
}

pub fn total_years(docs: &[Document], today: NaiveDate) -> YearsSummary {
    let mut spans = Vec::new();
    let mut unparsed = Vec::new();

    for doc in docs {
        match span(doc, today) {
            Some(s) => spans.push(s),
            None => unparsed.push(doc.doc_id.clone()),
        }
    }

    spans.sort();
    let mut months: i32 = 0;
    let mut current: Option<Span> = None;
    for s in &spans {
        current = match current {
            Some(c) if s.start <= c.end.saturating_add(1) => Some(Span {
                start: c.start,
                end: c.end.max(s.end),
            }),
            Some(c) => {
                months = months.saturating_add(c.len());
                Some(*s)
            }
            None => Some(*s),
        };
    }
    if let Some(c) = current {
        months = months.saturating_add(c.len());
    }

    YearsSummary {
        years: (f64::from(months) / 12.0 * 10.0).round() / 10.0,
        months,
        roles: spans.len(),
        unparsed,
    }
}

/// Skills across roles, most frequent first, ties alphabetical.
/// Counting is case-insensitive and keeps the first spelling seen.
pub fn skill_counts(docs: &[Document]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();

    for doc in docs {
        let skills: Vec<String> = match doc.metadata.get("skills") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            Some(Value::String(list)) => list.split(',').map(String::from).collect(),
            _ => Vec::new(),
        };

        for skill in skills {
            let skill = skill.trim();
            if skill.is_empty() {
                continue;
            }
            counts
                .entry(skill.to_lowercase())
                .or_insert_with(|| (skill.to_string(), 0))
                .1 += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
