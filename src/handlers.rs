//! Intercept handlers
//!
//! Hand-written answers for the question shapes matched by
//! [`crate::intercept::InterceptRuleSet`]. Templates still go through the
//! safety gate before execution.

use crate::db::{run_guarded, EntityCatalog, QueryExecutor};
use crate::error::Result;
use crate::formatter::{self, MarkdownTable};
use crate::intercept::Intercept;
use crate::models::{QueryResult, Response, Row};
use crate::resolver::{EntityLookup, EntityResolver, Tier};
use crate::safety::SafetyGate;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const PROJECT_SQL: &str = r#"
SELECT
  p.id,
  p.name                                   AS project_name,
  pt.name                                  AS template_name,
  CONCAT(u."firstName", ' ', u."lastName") AS designer_name,
  CONCAT(l."firstName", ' ', l."lastName") AS client_name,
  TO_CHAR(p."startDate", 'YYYY-MM-DD')     AS start_date,
  p."percentComplete"                      AS stored_percent_complete,
  TO_CHAR(p."createdAt", 'YYYY-MM-DD')     AS created_at
FROM projects p
LEFT JOIN project_templates pt ON p.project_template_id = pt.id
LEFT JOIN users u ON p.project_designer_id = u.id
LEFT JOIN leads l ON p.client_id = l.id
WHERE UPPER(p.name) = UPPER($1)
LIMIT 1
"#;

const PHASE_PROGRESS_SQL: &str = r#"
SELECT
  ph.name    AS phase_name,
  ph."order" AS phase_order,
  ph.status  AS phase_status,
  COUNT(sp.id) FILTER (WHERE sp.status = 'Completed') AS done,
  COUNT(sp.id) AS total
FROM phases ph
LEFT JOIN subphases sp ON sp.phase_id = ph.id
WHERE ph.project_id::text = $1
GROUP BY ph.id
ORDER BY ph."order"
"#;

const PHASE_STATUS_SQL: &str = r#"
SELECT
  p.name     AS project_name,
  ph.name    AS phase_name,
  ph."order" AS phase_order,
  ph.status  AS phase_status
FROM projects p
JOIN phases ph ON ph.project_id = p.id
WHERE p.name ILIKE $1
ORDER BY ph."order"
"#;

const BUDGET_ALL_SQL: &str = r#"
SELECT
  p.name AS project,
  COUNT(i.id) AS invoice_count,
  COALESCE(SUM(i."totalAmount"), 0)::numeric(12,2)::text AS total_invoiced
FROM projects p
LEFT JOIN leads l ON p.client_id = l.id
LEFT JOIN invoices i ON i.customer_id = l.id
GROUP BY p.name
ORDER BY COALESCE(SUM(i."totalAmount"), 0) DESC
"#;

const PROJECT_BUDGET_SQL: &str = r#"
SELECT
  p.name            AS project,
  i."invoiceNumber" AS invoice_no,
  i."totalAmount"::numeric(12,2)::text AS amount,
  i."paymentStatus" AS status,
  TO_CHAR(i."paymentDate", 'YYYY-MM-DD') AS paid_on
FROM projects p
JOIN leads l ON p.client_id = l.id
JOIN invoices i ON i.customer_id = l.id
WHERE UPPER(p.name) = $1
ORDER BY i."paymentDate" DESC
"#;

/// Exact project lookup used as tier 1 of the resolver.
struct ProjectLookup<'a> {
    db: &'a dyn QueryExecutor,
    gate: &'a SafetyGate,
}

#[async_trait]
impl<'a> EntityLookup for ProjectLookup<'a> {
    type Record = Row;

    /// A failing lookup statement is treated as a miss so the name can still
    /// be matched against the catalog. Outages propagate.
    async fn find_exact(&self, name: &str) -> Result<Option<Row>> {
        match run_guarded(self.db, self.gate, PROJECT_SQL, &[name.to_string()]).await {
            Ok((_, result)) => Ok(result.rows.into_iter().next()),
            Err(e) if e.is_recoverable() => {
                warn!("⚠️  Exact project lookup failed, trying the catalog: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn count(row: &Row, column: &str) -> u64 {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

pub struct InterceptHandlers {
    db: Arc<dyn QueryExecutor>,
    catalog: Arc<dyn EntityCatalog>,
    gate: SafetyGate,
    resolver: EntityResolver,
}

impl InterceptHandlers {
    pub fn new(db: Arc<dyn QueryExecutor>, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self {
            db,
            catalog,
            gate: SafetyGate::new(),
            resolver: EntityResolver::default(),
        }
    }

    pub async fn handle(&self, intercept: &Intercept) -> Result<Response> {
        info!("⚡ Answering with intercept handler: {:?}", intercept);
        match intercept {
            Intercept::ProjectSummary(name) => self.project_summary(name).await,
            Intercept::PhaseStatus(name) => self.phase_status(name).await,
            Intercept::BudgetAll => self.budget_all().await,
            Intercept::ProjectBudget(name) => self.project_budget(name).await,
        }
    }

    async fn run(&self, sql: &str, params: &[String]) -> Result<QueryResult> {
        let (_, result) = run_guarded(self.db.as_ref(), &self.gate, sql, params).await?;
        Ok(result)
    }

    /// Exact summary, else fuzzy suggestions, else the full project list.
    pub async fn project_summary(&self, raw_name: &str) -> Result<Response> {
        let lookup = ProjectLookup {
            db: self.db.as_ref(),
            gate: &self.gate,
        };
        let resolution = self
            .resolver
            .resolve(&lookup, raw_name, self.catalog.as_ref(), "projects")
            .await?;
        let message = match (resolution.tier, &resolution.primary) {
            (Tier::Exact, Some(project)) => return self.render_summary(project).await,
            (Tier::Fuzzy, _) => formatter::did_you_mean(raw_name, &resolution.suggestions),
            _ => formatter::full_catalog(raw_name, &resolution.suggestions),
        };
        Ok(Response::ok(message))
    }

    async fn render_summary(&self, project: &Row) -> Result<Response> {
        let project_id = formatter::field(project, "id");
        let phases = self.run(PHASE_PROGRESS_SQL, &[project_id]).await?;

        let mut table = MarkdownTable::new(["Phase", "Order", "Status", "% Done"]);
        for phase in &phases.rows {
            table.push_row(vec![
                formatter::field(phase, "phase_name"),
                formatter::field(phase, "phase_order"),
                formatter::field(phase, "phase_status"),
                formatter::percent(count(phase, "done"), count(phase, "total")),
            ]);
        }

        let message = format!(
            "**Project:** {}  \n\
             - **Template:** {}  \n\
             - **Designer:** {}  \n\
             - **Client:** {}  \n\
             - **Start Date:** {}  \n\
             - **Overall % Complete:** {}%  \n\
             - **Created At:** {}  \n\n\
             **Phases:**\n\n{}",
            formatter::field(project, "project_name"),
            formatter::field(project, "template_name"),
            formatter::field(project, "designer_name"),
            formatter::field(project, "client_name"),
            formatter::field(project, "start_date"),
            formatter::field(project, "stored_percent_complete"),
            formatter::field(project, "created_at"),
            table.render()
        );
        Ok(Response::ok(message))
    }

    pub async fn phase_status(&self, name: &str) -> Result<Response> {
        let result = self.run(PHASE_STATUS_SQL, &[format!("%{}%", name)]).await?;
        let Some(first) = result.rows.first() else {
            return Ok(Response::ok(format!("No phases found for project '{}'.", name)));
        };

        let mut table = MarkdownTable::new(["Phase", "Order", "Status"]);
        for row in &result.rows {
            table.push_row(vec![
                formatter::field(row, "phase_name"),
                formatter::field(row, "phase_order"),
                formatter::field(row, "phase_status"),
            ]);
        }
        Ok(Response::ok(format!(
            "**Phase Status for {}:**\n\n{}",
            formatter::field(first, "project_name"),
            table.render()
        )))
    }

    pub async fn budget_all(&self) -> Result<Response> {
        let result = self.run(BUDGET_ALL_SQL, &[]).await?;
        if result.is_empty() {
            return Ok(Response::ok("No invoice data found for any project."));
        }

        let mut table = MarkdownTable::new(["Project", "# Invoices", "Total Invoiced"]);
        for row in &result.rows {
            table.push_row(vec![
                formatter::bold(&formatter::field(row, "project")),
                formatter::field(row, "invoice_count"),
                formatter::money(row, "total_invoiced"),
            ]);
        }
        Ok(Response::ok(format!(
            "**Budget Status for All Projects**\n\n{}",
            table.render()
        )))
    }

    pub async fn project_budget(&self, project_key: &str) -> Result<Response> {
        let result = self.run(PROJECT_BUDGET_SQL, &[project_key.to_uppercase()]).await?;
        let Some(first) = result.rows.first() else {
            return Ok(Response::ok(format!(
                "No invoices found for project {}.",
                formatter::bold(project_key)
            )));
        };

        let mut table = MarkdownTable::new(["Invoice #", "Amount", "Status", "Paid On"]);
        for row in &result.rows {
            table.push_row(vec![
                formatter::field(row, "invoice_no"),
                formatter::money(row, "amount"),
                formatter::field(row, "status"),
                formatter::field(row, "paid_on"),
            ]);
        }
        Ok(Response::ok(format!(
            "**Invoices for {}:**\n\n{}",
            formatter::field(first, "project"),
            table.render()
        )))
    }
}
