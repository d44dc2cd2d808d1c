//! Generic Resolution Pipeline
//!
//! Questions no intercept rule claims go through an explicit state machine:
//!
//! ```text
//! Start -> IntentClassified -> SqlGenerated -> Executed -> Formatted -> Done
//!                          \-> NoDatabaseNeeded -----------------------> Done
//! ```
//!
//! Rejected or failed SQL degrades to a free-form answer, and so does an
//! expired deadline on any generation call. Any other error propagates to
//! the router boundary.

use crate::db::{run_guarded, QueryExecutor};
use crate::error::{AssistantError, Result};
use crate::llm::{IntentVerdict, TextGenerator};
use crate::models::{QueryRequest, QueryResult, Response};
use crate::prompts;
use crate::safety::{ApprovedSql, SafetyGate};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Stage {
    Start,
    IntentClassified(IntentVerdict),
    SqlGenerated(String),
    Executed { sql: ApprovedSql, result: QueryResult },
    /// Gate rejection, execution failure or timeout
    ExecutionFailed(AssistantError),
    NoDatabaseNeeded,
    Done(Response),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::IntentClassified(_) => "intent_classified",
            Stage::SqlGenerated(_) => "sql_generated",
            Stage::Executed { .. } => "executed",
            Stage::ExecutionFailed(_) => "execution_failed",
            Stage::NoDatabaseNeeded => "no_database_needed",
            Stage::Done(_) => "done",
        }
    }
}

pub struct GenericPipeline {
    llm: Arc<dyn TextGenerator>,
    db: Arc<dyn QueryExecutor>,
    gate: SafetyGate,
    schema_text: String,
    system_prompt: String,
}

/// An expired generation deadline counts as a failed query, not an outage.
fn on_timeout(step: Result<Stage>) -> Result<Stage> {
    match step {
        Err(e @ AssistantError::Timeout { .. }) => Ok(Stage::ExecutionFailed(e)),
        other => other,
    }
}

impl GenericPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, db: Arc<dyn QueryExecutor>, schema_text: String) -> Self {
        let system_prompt = prompts::system_prompt(&schema_text);
        Self {
            llm,
            db,
            gate: SafetyGate::new(),
            schema_text,
            system_prompt,
        }
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    pub async fn run(&self, request: &QueryRequest) -> Result<Response> {
        let mut stage = Stage::Start;
        loop {
            debug!("Pipeline stage: {}", stage.name());
            stage = match stage {
                Stage::Start => on_timeout(self.classify(request).await)?,
                Stage::IntentClassified(verdict) => {
                    if verdict.needs_database {
                        on_timeout(self.generate(request).await)?
                    } else {
                        Stage::NoDatabaseNeeded
                    }
                }
                Stage::SqlGenerated(candidate) => self.execute(&candidate).await?,
                Stage::Executed { sql, result } => {
                    on_timeout(self.format(request, sql, result).await.map(Stage::Done))?
                }
                Stage::ExecutionFailed(error) => Stage::Done(self.fallback(request, error).await?),
                Stage::NoDatabaseNeeded => {
                    let message = self.free_form(request).await?;
                    Stage::Done(Response {
                        no_database: Some(true),
                        ..Response::ok(message)
                    })
                }
                Stage::Done(response) => return Ok(response),
            };
        }
    }

    async fn classify(&self, request: &QueryRequest) -> Result<Stage> {
        let verdict = match self.llm.classify_intent(request.text(), &self.schema_text).await? {
            Some(verdict) => verdict,
            None => {
                warn!("Intent output unreadable, attempting a database answer");
                IntentVerdict::database_default()
            }
        };
        debug!(
            "Intent: needs_database={} ({})",
            verdict.needs_database, verdict.explanation
        );
        Ok(Stage::IntentClassified(verdict))
    }

    async fn generate(&self, request: &QueryRequest) -> Result<Stage> {
        let candidate = self.llm.generate_sql(request.text(), &self.schema_text).await?;
        Ok(Stage::SqlGenerated(candidate))
    }

    async fn execute(&self, candidate: &str) -> Result<Stage> {
        match run_guarded(self.db.as_ref(), &self.gate, candidate, &[]).await {
            Ok((sql, result)) => Ok(Stage::Executed { sql, result }),
            Err(e) if e.is_recoverable() => Ok(Stage::ExecutionFailed(e)),
            Err(e) => Err(e),
        }
    }

    async fn format(&self, request: &QueryRequest, sql: ApprovedSql, result: QueryResult) -> Result<Response> {
        info!("📊 Formatting {} rows", result.row_count());
        let message = self
            .llm
            .format_results(request.text(), sql.as_str(), &result.rows)
            .await?;
        Ok(Response {
            sql_query: Some(sql.into_inner()),
            results_count: Some(result.row_count()),
            ..Response::ok(message)
        })
    }

    /// Free-form answer that keeps the conversation going after a failed query.
    async fn fallback(&self, request: &QueryRequest, error: AssistantError) -> Result<Response> {
        warn!("⚠️  Database answer failed, falling back to free-form: {}", error);
        let message = self.free_form(request).await?;
        Ok(Response {
            error: Some(error.to_string()),
            ..Response::ok(message)
        })
    }

    async fn free_form(&self, request: &QueryRequest) -> Result<String> {
        self.llm
            .generate_response(request.text(), request.history(), Some(&self.system_prompt))
            .await
    }
}
