//! Query router: intercept rules first, then the generic pipeline.

use crate::db::{EntityCatalog, QueryExecutor};
use crate::error::Result;
use crate::handlers::InterceptHandlers;
use crate::intercept::InterceptRuleSet;
use crate::llm::TextGenerator;
use crate::models::{QueryRequest, Response};
use crate::pipeline::GenericPipeline;
use crate::schema::SchemaCatalog;
use std::sync::Arc;
use tracing::{error, info};

/// Shown to the caller when a collaborator is unavailable.
pub const APOLOGY: &str = "I'm sorry, something went wrong while answering that. Could you try rephrasing?";

pub struct QueryRouter {
    rules: InterceptRuleSet,
    handlers: InterceptHandlers,
    pipeline: GenericPipeline,
}

impl QueryRouter {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        db: Arc<dyn QueryExecutor>,
        catalog: Arc<dyn EntityCatalog>,
        schema: &SchemaCatalog,
    ) -> Self {
        Self {
            rules: InterceptRuleSet::standard(),
            handlers: InterceptHandlers::new(db.clone(), catalog),
            pipeline: GenericPipeline::new(llm, db, schema.format_prompt()),
        }
    }

    pub fn rules(&self) -> &InterceptRuleSet {
        &self.rules
    }

    /// Never fails: outages become `success = false` with the raw error kept
    /// in the diagnostic field.
    pub async fn process(&self, request: &QueryRequest) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("❌ Failed to answer '{}': {}", request.text(), e);
                Response::failure(APOLOGY, e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: &QueryRequest) -> Result<Response> {
        if let Some(intercept) = self.rules.match_first(request.text()) {
            return self.handlers.handle(&intercept).await;
        }
        info!("🔍 No intercept matched, using generic pipeline");
        self.pipeline.run(request).await
    }
}
