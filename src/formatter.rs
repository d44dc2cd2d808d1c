//! Response Formatter
//!
//! Deterministic markdown rendering for the intercept handlers. The generic
//! pipeline hands its rows to the text-generation collaborator instead and
//! returns that text verbatim.

use crate::models::Row;
use itertools::Itertools;
use serde_json::Value;

/// Placeholder for NULL / missing values
pub const MISSING: &str = "-";

/// Pipe table with a header row and one line per result row.
#[derive(Debug, Clone, Default)]
pub struct MarkdownTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let header = format!("| {} |", self.headers.iter().join(" | "));
        let divider = format!("|{}|", self.headers.iter().map(|_| "---").join("|"));
        let body = self
            .rows
            .iter()
            .map(|cells| format!("| {} |", cells.iter().join(" | ")));

        std::iter::once(header)
            .chain(std::iter::once(divider))
            .chain(body)
            .join("\n")
    }
}

/// Render one JSON value as table-cell text.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn field(row: &Row, column: &str) -> String {
    cell(row.get(column))
}

pub fn money(row: &Row, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(_) => format!("${}", field(row, column)),
    }
}

pub fn bold(text: &str) -> String {
    format!("**{}**", text)
}

/// `done / total` as a rounded percentage; `0%` when there is nothing to do.
pub fn percent(done: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let pct = (done as f64 / total as f64 * 100.0).round() as u64;
    format!("{}%", pct)
}

pub fn bullet_list(names: &[String]) -> String {
    names.iter().map(|n| format!("- {}", bold(n))).join("\n")
}

pub fn did_you_mean(requested: &str, suggestions: &[String]) -> String {
    format!(
        "I couldn't find an exact project named '{}'.\nDid you mean:\n\n{}",
        requested,
        bullet_list(suggestions)
    )
}

pub fn full_catalog(requested: &str, names: &[String]) -> String {
    format!(
        "No project matches '{}'. Here are all available projects:\n\n{}",
        requested,
        bullet_list(names)
    )
}
