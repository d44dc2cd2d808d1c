//! SQL Safety Gate
//!
//! Every statement that reaches the database passes through [`SafetyGate::validate`].
//! The gate strips code fences and a leading language tag, then accepts only text
//! that starts with `select` or `with`. Statements that parse as more than one
//! statement, or as anything other than a query, are refused as well.
//!
//! [`ApprovedSql`] can only be built here, so executors that take it cannot be
//! handed unchecked text.

use crate::error::{AssistantError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    static ref LANGUAGE_TAG: Regex = Regex::new(r"(?i)^\s*sql\s*").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A statement that passed the safety gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedSql(String);

impl ApprovedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Statement text without trailing semicolons or comments, usable as a
    /// subquery.
    pub fn body(&self) -> &str {
        &self.0[..executable_end(&self.0)]
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Byte offset just past the last token that is not whitespace, a semicolon
/// or a comment. Quoted text is skipped whole so `--` inside a literal stays.
fn executable_end(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut end = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                end = i;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
                continue;
            }
            b';' => {}
            b if b.is_ascii_whitespace() => {}
            _ => end = i + 1,
        }
        i += 1;
    }
    end
}

impl fmt::Display for ApprovedSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only statement gate
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Remove code fences and a leading `sql` tag, then trim.
    /// Casing and inner whitespace are left untouched.
    pub fn clean(candidate: &str) -> String {
        let unfenced = candidate.replace("```", "");
        LANGUAGE_TAG.replace(&unfenced, "").trim().to_string()
    }

    /// Comparison form: whitespace collapsed, lower-cased.
    pub fn normalize(cleaned: &str) -> String {
        WHITESPACE
            .replace_all(cleaned.trim(), " ")
            .to_lowercase()
    }

    pub fn validate(&self, candidate: &str) -> Result<ApprovedSql> {
        let cleaned = Self::clean(candidate);
        let normalized = Self::normalize(&cleaned);

        if !(normalized.starts_with("select") || normalized.starts_with("with")) {
            warn!("🛑 Safety gate rejected statement: {:?}", cleaned);
            return Err(AssistantError::Rejected(
                "only SELECT (or WITH) queries are allowed".to_string(),
            ));
        }

        match Parser::parse_sql(&PostgreSqlDialect {}, &cleaned) {
            Ok(statements) => {
                if statements.len() > 1 {
                    warn!("🛑 Safety gate rejected {} stacked statements", statements.len());
                    return Err(AssistantError::Rejected(format!(
                        "expected a single statement, found {}",
                        statements.len()
                    )));
                }
                if let Some(statement) = statements.first() {
                    if !matches!(statement, Statement::Query(_)) {
                        warn!("🛑 Safety gate rejected non-query statement: {:?}", cleaned);
                        return Err(AssistantError::Rejected(
                            "statement is not a read-only query".to_string(),
                        ));
                    }
                }
            }
            Err(e) => {
                // Dialect gaps fall back to the prefix guarantee; the read-only
                // transaction still refuses writes.
                debug!("Safety gate could not parse statement ({}), relying on prefix check", e);
            }
        }

        debug!("Approved SQL: {:?}", cleaned);
        Ok(ApprovedSql(cleaned))
    }
}
