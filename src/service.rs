//! Chat service: conversation history around the query router.

use crate::config::AppConfig;
use crate::conversation::ConversationStore;
use crate::db::{init_pool, PgDatabase, SchemaSource};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::models::{QueryRequest, Response};
use crate::router::QueryRouter;
use crate::schema::SchemaCatalog;
use std::sync::Arc;
use tracing::info;

/// Everything a surface needs, wired from one configuration.
pub struct App {
    pub service: ChatService,
    pub db: Arc<PgDatabase>,
    pub schema: SchemaCatalog,
}

impl App {
    /// Connect to the database, load the schema once and build the router.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = init_pool(
            config.database.connect_options()?,
            config.database.max_connections,
            config.response_timeout,
        )
        .await?;
        let db = Arc::new(PgDatabase::new(pool, config.response_timeout));
        let schema = db.load_schema().await?;

        let llm = LlmClient::new(
            config.require_api_key()?.to_string(),
            config.llm.model.clone(),
            config.llm.base_url.clone(),
        )
        .with_timeout(config.response_timeout)
        .with_history_turns(config.history_turns);
        info!("🤖 Using model {}", llm.model());

        let router = QueryRouter::new(Arc::new(llm), db.clone(), db.clone(), &schema);
        let service = ChatService::new(
            Arc::new(router),
            ConversationStore::new(config.max_conversation_length)
                .with_max_conversations(config.max_conversations),
            config.history_turns,
        );
        Ok(Self { service, db, schema })
    }
}

pub struct ChatService {
    router: Arc<QueryRouter>,
    store: ConversationStore,
    history_turns: usize,
}

impl ChatService {
    pub fn new(router: Arc<QueryRouter>, store: ConversationStore, history_turns: usize) -> Self {
        Self {
            router,
            store,
            history_turns,
        }
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    /// Answer `message` in the context of conversation `chat_id`, then record
    /// the exchange.
    pub async fn chat(&self, chat_id: &str, message: &str) -> Response {
        info!("💬 [{}] {}", chat_id, message);
        let history = self.store.history(chat_id);
        let request = QueryRequest::new(message, &history, self.history_turns);

        let response = self.router.process(&request).await;
        self.store.append(chat_id, message, &response.message);
        response
    }

    pub fn clear(&self, chat_id: &str) -> bool {
        self.store.clear(chat_id)
    }
}
