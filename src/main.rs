//! Earnings-call transcript chat relay
//!
//! Lets users hold a conversation with an AI model about one company's
//! earnings call. Chats are stored in `SQLite` and turns are relayed to
//! every connected client over a socket.

mod api;
mod chat;
mod config;
mod db;
mod llm;
mod relay;
mod session;
mod telemetry;
mod transcripts;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{GeminiService, LlmService, LoggingService};
use session::{DatabaseStore, LlmCompletion, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use transcripts::TranscriptClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    telemetry::init(config.remote_log.as_ref());

    for secret in config.missing_secrets() {
        tracing::warn!(%secret, "Secret not configured; dependent feature will fail");
    }

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    // Completion service
    let gemini = GeminiService::new(
        config.gemini_api_key.clone(),
        &config.completion_model,
        config.llm_gateway.as_deref(),
    )?;
    let model: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
    tracing::info!(
        model = %model.model_id(),
        timeout_secs = config.completion_timeout.as_secs(),
        "Completion service initialized"
    );

    let transcripts = TranscriptClient::new(&config.transcript_url, &config.finance_token)?;

    let sessions = SessionManager::new(
        Arc::new(DatabaseStore::new(db)),
        Arc::new(transcripts),
        Arc::new(LlmCompletion::new(model)),
    )
    .with_completion_timeout(config.completion_timeout);

    let state = AppState::new(sessions);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Transcript chat relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
