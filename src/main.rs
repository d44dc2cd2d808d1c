use anyhow::Result;
use clap::{Parser, Subcommand};
use sitequery::config::AppConfig;
use sitequery::db::{init_pool, PgDatabase, SchemaSource};
use sitequery::safety::SafetyGate;
use sitequery::service::App;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitequery")]
#[command(about = "Ask questions about construction projects in plain English")]
struct Args {
    /// PostgreSQL URL (or set DATABASE_URL / DB_* env vars)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// LLM API key (or set LLM_API_KEY / OPENAI_API_KEY env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Chat-completions model name
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one question
    Ask {
        question: String,

        /// Print the full response object as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the schema description given to the model
    Schema,
    /// Run a statement through the safety gate without executing it
    CheckSql { sql: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }
    if let Some(key) = args.api_key {
        config.llm.api_key = Some(key);
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    match args.command {
        Command::Ask { question, json } => {
            info!("Question: {}", question);
            let app = App::connect(&config).await?;
            let response = app.service.chat("cli", &question).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.message);
            }
        }
        Command::Schema => {
            let pool = init_pool(
                config.database.connect_options()?,
                config.database.max_connections,
                config.response_timeout,
            )
            .await?;
            let db = PgDatabase::new(pool, config.response_timeout);
            println!("{}", db.load_schema().await?.format_prompt());
        }
        Command::CheckSql { sql } => match SafetyGate::new().validate(&sql) {
            Ok(approved) => println!("✅ Allowed: {}", approved),
            Err(e) => {
                println!("❌ {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
