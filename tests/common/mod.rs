//! In-memory collaborators for driving the router without a database or LLM.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use sitequery::db::{EntityCatalog, QueryExecutor};
use sitequery::error::{AssistantError, Result};
use sitequery::llm::{IntentVerdict, TextGenerator};
use sitequery::models::{Row, Turn};
use sitequery::safety::ApprovedSql;
use sitequery::schema::{ColumnInfo, SchemaCatalog};
use sitequery::QueryRouter;
use std::sync::{Arc, Mutex};

pub fn row(value: Value) -> Row {
    value.as_object().cloned().expect("row must be a JSON object")
}

pub fn schema() -> SchemaCatalog {
    let mut catalog = SchemaCatalog::default();
    catalog.tables.insert(
        "projects".to_string(),
        vec![ColumnInfo {
            column_name: "name".to_string(),
            data_type: "text".to_string(),
            is_nullable: "NO".to_string(),
            column_default: None,
        }],
    );
    catalog
}

pub fn router(llm: &Arc<FakeGenerator>, db: &Arc<FakeDatabase>) -> QueryRouter {
    QueryRouter::new(llm.clone(), db.clone(), db.clone(), &schema())
}

#[derive(Clone)]
enum Canned {
    Rows(Vec<Row>),
    Failure(String),
    Outage,
}

/// Answers by the first registered substring found in the statement.
#[derive(Default)]
pub struct FakeDatabase {
    canned: Vec<(String, Canned)>,
    names: Vec<String>,
    executed: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.canned.push((needle.to_string(), Canned::Rows(rows)));
        self
    }

    pub fn with_failure(mut self, needle: &str, message: &str) -> Self {
        self.canned.push((needle.to_string(), Canned::Failure(message.to_string())));
        self
    }

    pub fn with_outage(mut self, needle: &str) -> Self {
        self.canned.push((needle.to_string(), Canned::Outage));
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeDatabase {
    async fn execute(&self, sql: &ApprovedSql, params: &[String]) -> Result<Vec<Row>> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.as_str().to_string(), params.to_vec()));

        let hit = self
            .canned
            .iter()
            .find(|(needle, _)| sql.as_str().contains(needle.as_str()));
        match hit.map(|(_, canned)| canned.clone()) {
            Some(Canned::Rows(rows)) => Ok(rows),
            Some(Canned::Failure(message)) => Err(AssistantError::Execution(message)),
            Some(Canned::Outage) => Err(AssistantError::Database(sqlx::Error::PoolTimedOut)),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl EntityCatalog for FakeDatabase {
    async fn list_names(&self, _table: &str) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }
}

/// Scripted answer for one generator capability.
#[derive(Clone)]
pub enum Reply<T> {
    Ok(T),
    Timeout,
    Outage,
}

impl<T: Clone> Reply<T> {
    fn get(&self, operation: &str) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Timeout => Err(AssistantError::timeout(operation, 30)),
            Reply::Outage => Err(AssistantError::Llm("connection refused".to_string())),
        }
    }
}

pub struct FakeGenerator {
    pub intent: Reply<Option<IntentVerdict>>,
    pub sql: Reply<String>,
    pub formatted: Reply<String>,
    pub free_form: Reply<String>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeGenerator {
    /// Classifies everything as a database question and answers with `sql`.
    pub fn database(sql: &str) -> Self {
        Self {
            intent: Reply::Ok(Some(verdict(true))),
            sql: Reply::Ok(sql.to_string()),
            formatted: Reply::Ok("Here is what I found.".to_string()),
            free_form: Reply::Ok("Let me answer that from general knowledge.".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn conversational(answer: &str) -> Self {
        Self {
            intent: Reply::Ok(Some(verdict(false))),
            free_form: Reply::Ok(answer.to_string()),
            ..Self::database("SELECT 1")
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn verdict(needs_database: bool) -> IntentVerdict {
    IntentVerdict {
        needs_database,
        explanation: "scripted".to_string(),
        suggested_approach: None,
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_response(
        &self,
        _prompt: &str,
        _history: &[Turn],
        _system_prompt: Option<&str>,
    ) -> Result<String> {
        self.record("generate_response");
        self.free_form.get("response generation")
    }

    async fn generate_sql(&self, _request: &str, _schema: &str) -> Result<String> {
        self.record("generate_sql");
        self.sql.get("SQL generation")
    }

    async fn classify_intent(&self, _request: &str, _schema: &str) -> Result<Option<IntentVerdict>> {
        self.record("classify_intent");
        self.intent.get("intent classification")
    }

    async fn format_results(&self, _request: &str, _sql: &str, _rows: &[Row]) -> Result<String> {
        self.record("format_results");
        self.formatted.get("result formatting")
    }
}
