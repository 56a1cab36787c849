//! HTTP request handlers

use super::types::{
    ChatIdResponse, ChatQuery, HeartbeatResponse, NewChatRequest, UserIdResponse, UserQuery,
};
use super::ws::socket_handler;
use super::AppState;
use crate::chat::{self, Turn};
use crate::db::ChatSummary;
use crate::session::SessionError;
use crate::telemetry::ACCESS_TARGET;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(heartbeat))
        .route("/get-new-ai-userid", get(new_user_id))
        .route("/start-new-chat", post(start_new_chat))
        .route(
            "/get-earnings-call-chat-message-history",
            get(chat_message_history),
        )
        .route("/get-earnings-call-chats-for-user", get(chats_for_user))
        // Real-time relay channel
        .route("/socket", get(socket_handler))
        .layer(middleware::from_fn(log_access))
        .with_state(state)
}

// ============================================================
// Access Log
// ============================================================

/// Record the path and client address of every request
async fn log_access(request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
    tracing::info!(target: ACCESS_TARGET, path = %request.uri().path(), %ip, "Resource accessed");
    next.run(request).await
}

// ============================================================
// Liveness and Identity
// ============================================================

async fn heartbeat() -> Json<HeartbeatResponse> {
    Json(HeartbeatResponse {
        message: "Transcript chat relay is alive!".to_string(),
    })
}

async fn new_user_id() -> Json<UserIdResponse> {
    let userid = chat::new_user_id();
    tracing::info!(user_id = %userid, "Issued new user id");
    Json(UserIdResponse { userid })
}

// ============================================================
// Chats
// ============================================================

async fn start_new_chat(
    State(state): State<AppState>,
    payload: Result<Json<NewChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatIdResponse>), AppError> {
    let Json(req) = payload.map_err(|e| {
        tracing::info!(error = %e, "Rejected malformed new chat request");
        AppError::BadRequest
    })?;

    // Out-of-range quarters have no transcript either
    let Ok(quarter) = u8::try_from(req.quarter) else {
        tracing::info!(ticker = %req.ticker, quarter = req.quarter, year = req.year, "Rejected chat for invalid quarter");
        return Err(AppError::BadRequest);
    };

    let chatid = state
        .sessions
        .create_session(&req.userid, &req.ticker, quarter, req.year)
        .await?;

    Ok((StatusCode::CREATED, Json(ChatIdResponse { chatid })))
}

async fn chat_message_history(
    State(state): State<AppState>,
    query: Result<Query<ChatQuery>, QueryRejection>,
) -> Result<Json<Vec<Turn>>, AppError> {
    let Query(query) = query.map_err(|_| AppError::BadRequest)?;
    let history = state.sessions.get_visible_history(&query.chatid).await?;
    Ok(Json(history))
}

async fn chats_for_user(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    let Query(query) = query.map_err(|_| AppError::BadRequest)?;
    let chats = state.sessions.try_sessions_for_owner(&query.userid).await?;
    Ok(Json(chats))
}

// ============================================================
// Error Handling
// ============================================================

/// Handler failure. Clients only see the status code.
#[derive(Debug)]
enum AppError {
    BadRequest,
    Internal,
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::TranscriptUnavailable { .. } => AppError::BadRequest,
            SessionError::NotFound(_)
            | SessionError::CorruptSession { .. }
            | SessionError::Persistence(_) => AppError::Internal,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest => StatusCode::BAD_REQUEST,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}
