//! Database module for PostgreSQL connection and operations
//!
//! The core talks to the database only through these traits. Executors take
//! [`ApprovedSql`], which only the safety gate can produce.

pub mod connection;
pub mod postgres;

pub use connection::{init_pool, DbPool};
pub use postgres::PgDatabase;

use crate::error::Result;
use crate::models::{QueryResult, Row};
use crate::safety::{ApprovedSql, SafetyGate};
use crate::schema::SchemaCatalog;
use async_trait::async_trait;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one approved statement; parameters bind as text (`$1`, `$2`, ...).
    async fn execute(&self, sql: &ApprovedSql, params: &[String]) -> Result<Vec<Row>>;
}

#[async_trait]
pub trait EntityCatalog: Send + Sync {
    /// Every `name` in `table`, ordered.
    async fn list_names(&self, table: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn load_schema(&self) -> Result<SchemaCatalog>;
}

/// Gate then execute. The only way template or generated SQL reaches an executor.
pub async fn run_guarded<E: QueryExecutor + ?Sized>(
    executor: &E,
    gate: &SafetyGate,
    candidate: &str,
    params: &[String],
) -> Result<(ApprovedSql, QueryResult)> {
    let approved = gate.validate(candidate)?;
    let rows = executor.execute(&approved, params).await?;
    Ok((approved, QueryResult::new(rows)))
}
