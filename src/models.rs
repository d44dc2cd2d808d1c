//! Request and response values
//!
//! These are the only shapes that cross the boundary between the query router
//! and its callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One result row, column name → value, in SELECT order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A single inbound question plus the recent turns it was asked after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    text: String,
    history: Vec<Turn>,
}

impl QueryRequest {
    /// Keeps only the most recent `max_turns` history entries.
    pub fn new(text: impl Into<String>, history: &[Turn], max_turns: usize) -> Self {
        let start = history.len().saturating_sub(max_turns);
        Self {
            text: text.into(),
            history: history[start..].to_vec(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}

/// Rows returned by one approved statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the caller receives for every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_database: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
