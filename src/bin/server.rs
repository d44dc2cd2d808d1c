//! HTTP server for the chat UI
//! Minimal HTTP/1.1 handling on top of tokio

use clap::Parser;
use serde_json::{json, Value};
use sitequery::config::AppConfig;
use sitequery::service::App;
use sitequery::Response;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Parser)]
#[command(name = "sitequery-server")]
struct Args {
    /// Listen address (or set SERVER_ADDR)
    #[arg(long)]
    addr: Option<String>,

    /// PostgreSQL URL (or set DATABASE_URL / DB_* env vars)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(addr) = args.addr {
        config.server_addr = addr;
    }
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }

    info!("🚀 Starting construction chat server...");
    let app = Arc::new(App::connect(&config).await?);

    let listener = TcpListener::bind(&config.server_addr).await?;
    info!("✅ Server listening on http://{}", config.server_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("📥 New connection from: {}", addr);
        tokio::spawn(handle_connection(app.clone(), stream));
    }
}

async fn handle_connection(app: Arc<App>, mut stream: TcpStream) {
    let raw = match read_request(&mut stream).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read from stream: {}", e);
            return;
        }
    };

    let response = match Request::parse(&raw) {
        Some(request) => handle_request(&app, &request).await,
        None => create_response(400, "Bad Request", r#"{"error":"Malformed request"}"#),
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Read headers, then as much body as `Content-Length` announces.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let expected = content_length(&text[..header_end]);
            if buffer.len() >= header_end + 4 + expected {
                break;
            }
        }
        if buffer.len() > MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: String,
}

impl Request {
    fn parse(raw: &str) -> Option<Self> {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let mut lines = head.lines();
        let mut parts = lines.next()?.split_whitespace();
        let method = parts.next()?.to_string();
        let target = parts.next()?;

        // drop query string and trailing slash
        let path = target.split('?').next().unwrap_or(target).trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path }.to_string();

        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .collect();

        Some(Self {
            method,
            path,
            headers,
            body: body.to_string(),
        })
    }
}

async fn handle_request(app: &App, request: &Request) -> String {
    info!("🔍 Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => create_response(200, "OK", ""),
        ("GET", "/api/health") => match app.db.ping().await {
            Ok(()) => json_response(200, "OK", json!({"status": "healthy", "database": "connected"})),
            Err(e) => json_response(
                500,
                "Internal Server Error",
                json!({"status": "unhealthy", "database": "disconnected", "error": e.to_string()}),
            ),
        },
        ("GET", "/api/tables") => {
            let tables = app.schema.table_names();
            json_response(
                200,
                "OK",
                json!({"count": tables.len(), "tables": tables, "schema": app.schema.format_prompt()}),
            )
        }
        ("POST", "/api/chat") => chat(app, request).await,
        ("POST", path) if path.starts_with("/api/clear-chat/") => {
            let chat_id = &path["/api/clear-chat/".len()..];
            let cleared = app.service.clear(chat_id);
            let message = if cleared {
                "Chat history cleared"
            } else {
                "No chat history for that id"
            };
            json_response(200, "OK", json!({"success": true, "message": message}))
        }
        _ => json_response(404, "Not Found", json!({"error": "Not found"})),
    }
}

async fn chat(app: &App, request: &Request) -> String {
    if request
        .headers
        .get("content-type")
        .is_some_and(|ct| !ct.starts_with("application/json"))
    {
        warn!("Chat request with non-JSON content type");
    }

    let payload: Value = serde_json::from_str(&request.body).unwrap_or(Value::Null);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if message.is_empty() {
        return json_response(400, "Bad Request", json!({"error": "Message is required"}));
    }

    let chat_id = payload
        .get("chat_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = app.service.chat(&chat_id, message).await;
    json_response(200, "OK", chat_body(&response, &chat_id))
}

/// Client-facing chat reply. Diagnostics stay in the server log.
fn chat_body(response: &Response, chat_id: &str) -> Value {
    if let Some(error) = &response.error {
        warn!("⚠️  Chat {} answered with error: {}", chat_id, error);
    }
    if let Some(sql) = &response.sql_query {
        debug!("Chat {} ran SQL: {}", chat_id, sql);
    }
    json!({
        "message": response.message,
        "success": response.success,
        "chat_id": chat_id,
    })
}

fn json_response(status: u16, status_text: &str, body: Value) -> String {
    create_response(status, status_text, &body.to_string())
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
