pub mod config;
pub mod conversation;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod intercept;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod resolver;
pub mod router;
pub mod safety;
pub mod schema;
pub mod service;

// Database module for PostgreSQL
pub mod db;

pub use error::{AssistantError, Result};
pub use models::{QueryRequest, Response, Turn};
pub use router::QueryRouter;
pub use service::ChatService;
