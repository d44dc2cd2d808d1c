//! Runtime configuration, read from the environment (and `.env`).

use crate::conversation::DEFAULT_MAX_CONVERSATIONS;
use crate::error::{AssistantError, Result};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub sslmode: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// `DATABASE_URL` when set, otherwise built from the `DB_*` parts. The
    /// parts are passed as fields, so credentials need no URL escaping.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url)
                .map_err(|e| AssistantError::Config(format!("DATABASE_URL is invalid: {}", e)));
        }

        let ssl_mode = PgSslMode::from_str(&self.sslmode).map_err(|_| {
            AssistantError::Config(format!("DB_SSLMODE '{}' is not a valid sslmode", self.sslmode))
        })?;
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(ssl_mode);
        Ok(if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub max_conversation_length: usize,
    pub max_conversations: usize,
    pub history_turns: usize,
    pub response_timeout: Duration,
    pub server_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let api_key = var("LLM_API_KEY")
            .or_else(|| var("OPENAI_API_KEY"))
            .or_else(|| var("GEMINI_API_KEY"));

        Ok(Self {
            llm: LlmConfig {
                api_key,
                model: or("LLM_MODEL", "gpt-4o-mini"),
                base_url: or("LLM_BASE_URL", "https://api.openai.com/v1"),
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL"),
                host: or("DB_HOST", "localhost"),
                port: parse(&var, "DB_PORT", 5432)?,
                name: or("DB_NAME", "construction_db"),
                user: or("DB_USER", "postgres"),
                password: or("DB_PASSWORD", ""),
                sslmode: or("DB_SSLMODE", "prefer"),
                max_connections: parse(&var, "DB_MAX_CONNECTIONS", 5)?,
            },
            max_conversation_length: parse(&var, "MAX_CONVERSATION_LENGTH", 20)?,
            max_conversations: parse(&var, "MAX_CONVERSATIONS", DEFAULT_MAX_CONVERSATIONS)?,
            history_turns: parse(&var, "HISTORY_TURNS", 5)?,
            response_timeout: Duration::from_secs(parse(&var, "RESPONSE_TIMEOUT", 30)?),
            server_addr: or("SERVER_ADDR", "0.0.0.0:8080"),
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.llm.api_key.as_deref().ok_or_else(|| {
            AssistantError::Config("LLM_API_KEY (or OPENAI_API_KEY) is not set".to_string())
        })
    }
}

fn parse<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AssistantError::Config(format!("{} must be a number, got '{}'", key, raw))),
    }
}
