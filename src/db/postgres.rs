//! PostgreSQL collaborator
//!
//! Every approved statement runs in its own read-only transaction with a
//! statement timeout, wrapped as `SELECT row_to_json(q)::text FROM (<sql>) AS q`
//! so any result shape decodes to ordered JSON rows.

use super::{run_guarded, EntityCatalog, QueryExecutor, SchemaSource};
use crate::error::{AssistantError, Result};
use crate::models::Row;
use crate::safety::{ApprovedSql, SafetyGate};
use crate::schema::{ColumnInfo, ForeignKey, SchemaCatalog};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info, warn};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

const COLUMNS_SQL: &str = r#"
SELECT
    table_name,
    json_agg(json_build_object(
        'column_name', column_name,
        'data_type', data_type,
        'is_nullable', is_nullable,
        'column_default', column_default
    ) ORDER BY ordinal_position) AS columns
FROM information_schema.columns
WHERE table_schema = 'public'
GROUP BY table_name
ORDER BY table_name
"#;

const RELATIONSHIPS_SQL: &str = r#"
SELECT
    tc.table_name,
    kcu.column_name,
    ccu.table_name AS foreign_table_name,
    ccu.column_name AS foreign_column_name
FROM information_schema.table_constraints AS tc
JOIN information_schema.key_column_usage AS kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
JOIN information_schema.constraint_column_usage AS ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.table_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = 'public'
ORDER BY tc.table_name, kcu.column_name
"#;

/// Pool-backed database handle
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    gate: SafetyGate,
    statement_timeout: Duration,
}

impl PgDatabase {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            gate: SafetyGate::new(),
            statement_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Liveness check used by the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        run_guarded(self, &self.gate, "SELECT 1 AS ok", &[]).await?;
        Ok(())
    }

    async fn fetch_json_rows(&self, sql: &ApprovedSql, params: &[String]) -> std::result::Result<Vec<String>, sqlx::Error> {
        let wrapped = wrap(sql);
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        );

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        let mut query = sqlx::query_scalar::<_, String>(&wrapped);
        for param in params {
            query = query.bind(param.as_str());
        }
        let rows = query.fetch_all(&mut *tx).await?;

        // nothing to keep
        tx.rollback().await?;
        Ok(rows)
    }
}

/// The inner statement sits on its own lines so a trailing line comment
/// cannot swallow the closing parenthesis.
fn wrap(sql: &ApprovedSql) -> String {
    format!("SELECT row_to_json(q)::text FROM (\n{}\n) AS q", sql.body())
}

/// Statement-level failures are data-shaped; connection failures are outages.
fn classify(error: sqlx::Error) -> AssistantError {
    match &error {
        sqlx::Error::Database(db) => return AssistantError::Execution(db.message().to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::RowNotFound => {
            return AssistantError::Execution(error.to_string())
        }
        _ => {}
    }
    AssistantError::Database(error)
}

#[async_trait]
impl QueryExecutor for PgDatabase {
    async fn execute(&self, sql: &ApprovedSql, params: &[String]) -> Result<Vec<Row>> {
        debug!("Executing SQL with {} params: {}", params.len(), sql);
        let started = std::time::Instant::now();

        let raw = tokio::time::timeout(self.statement_timeout, self.fetch_json_rows(sql, params))
            .await
            .map_err(|_| AssistantError::timeout("SQL execution", self.statement_timeout.as_secs()))?
            .map_err(classify)?;

        let rows = raw
            .iter()
            .map(|json| serde_json::from_str::<Row>(json))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!("✅ Query returned {} rows in {}ms", rows.len(), started.elapsed().as_millis());
        Ok(rows)
    }
}

#[async_trait]
impl EntityCatalog for PgDatabase {
    async fn list_names(&self, table: &str) -> Result<Vec<String>> {
        if !IDENTIFIER.is_match(table) {
            return Err(AssistantError::Rejected(format!("invalid table name: {}", table)));
        }
        let sql = format!(r#"SELECT name FROM "{}" ORDER BY name"#, table);
        let (_, result) = run_guarded(self, &self.gate, &sql, &[]).await?;

        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl SchemaSource for PgDatabase {
    async fn load_schema(&self) -> Result<SchemaCatalog> {
        let (_, columns) = run_guarded(self, &self.gate, COLUMNS_SQL, &[]).await?;

        let mut catalog = SchemaCatalog::default();
        for row in columns.rows {
            let Some(table) = row.get("table_name").and_then(Value::as_str) else {
                continue;
            };
            let cols: Vec<ColumnInfo> =
                serde_json::from_value(row.get("columns").cloned().unwrap_or(Value::Null))?;
            catalog.tables.insert(table.to_string(), cols);
        }

        match run_guarded(self, &self.gate, RELATIONSHIPS_SQL, &[]).await {
            Ok((_, relationships)) => {
                for row in relationships.rows {
                    let fk: ForeignKey = serde_json::from_value(Value::Object(row))?;
                    catalog.relationships.push(fk);
                }
            }
            Err(e) => warn!("Failed to load relationships: {}", e),
        }

        info!(
            "Loaded schema: {} tables, {} relationships",
            catalog.tables.len(),
            catalog.relationships.len()
        );
        Ok(catalog)
    }
}
