//! # HTTP Server
//!
//! JSON API in front of the chat handler:
//! - `POST /api/chat`
//! - `GET /api/personas`
//! - `GET /api/health`
//!
//! Everything else answers with a JSON 404. Requests are rate limited per
//! client IP before they reach a route.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release with chat, personas and health routes, per-IP rate limiting and port fallback

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde_json::json;
use std::io::ErrorKind as IoErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::features::chat::handler::MSG_MISSING_INPUT;
use crate::features::chat::{ChatRequest, ChatRequestHandler, ErrorBody, ErrorResponse};
use crate::features::rate_limiting::RateLimiter;

const MAX_BODY_SIZE_10MB: usize = 10 * 1024 * 1024;
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests from this IP, please try again later.";

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatRequestHandler>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/personas", get(personas))
        .route("/api/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_10MB))
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected chat payload: {rejection}");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new(MSG_MISSING_INPUT)),
            )
                .into_response();
        }
    };

    match state.chat.handle(request).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn personas(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.chat.personas().summaries())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Route not found")))
}

async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !state.rate_limiter.check_rate_limit(&client) {
        warn!("Rate limit exceeded for {client}");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new(RATE_LIMITED_MESSAGE)),
        )
            .into_response();
    }

    next.run(request).await
}

/// Bind `port`, moving to the next port while the current one is taken.
/// Any other bind error, or running out of attempts, is returned.
pub async fn bind_with_fallback(host: &str, port: u16, max_attempts: u16) -> Result<TcpListener> {
    let mut port = port;
    for attempt in 1..=max_attempts.max(1) {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == IoErrorKind::AddrInUse && attempt < max_attempts => {
                let next = port.checked_add(1).context("No free port left to try")?;
                warn!("Port {port} is in use. Retrying on {next}...");
                port = next;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to bind {host}:{port}"));
            }
        }
    }
    anyhow::bail!("Failed to bind {host}:{port}")
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Persona chat server running on http://{addr}");

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
