//! HTTP surface — submission, queue inspection, batch send, and the
//! programmatic single-ticket resolution endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::error::{Error, StoreError};
use crate::lifecycle::TicketLifecycle;
use crate::ticket::RowId;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<TicketLifecycle>,
}

/// Build the API router.
pub fn router(lifecycle: Arc<TicketLifecycle>) -> Router {
    Router::new()
        .route("/api/tickets", post(submit_ticket))
        .route("/api/tickets/pending", get(pending_tickets))
        .route("/api/tickets/processed", get(processed_tickets))
        .route("/api/tickets/send", post(send_batch))
        .route("/api/tickets/resolve", post(resolve_ticket))
        .layer(CorsLayer::permissive())
        .with_state(AppState { lifecycle })
}

// ── Payloads ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    name: String,
    email: String,
    #[serde(default)]
    issue_type: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    rows: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    name: String,
    email: String,
    message: String,
}

// ── Handlers ────────────────────────────────────────────────────────

async fn submit_ticket(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, ApiError> {
    let ticket = state
        .lifecycle
        .submit(
            &req.name,
            &req.email,
            req.issue_type.as_deref().unwrap_or("Umum"),
            &req.message,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)).into_response())
}

async fn pending_tickets(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tickets = state.lifecycle.pending_tickets().await?;
    Ok(Json(tickets).into_response())
}

async fn processed_tickets(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tickets = state.lifecycle.processed_tickets().await?;
    Ok(Json(tickets).into_response())
}

async fn send_batch(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Response, ApiError> {
    let rows: Vec<RowId> = req.rows.into_iter().map(RowId).collect();
    let report = state.lifecycle.send_batch(&rows).await?;
    Ok(Json(report).into_response())
}

async fn resolve_ticket(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Response, ApiError> {
    let resolved = state
        .lifecycle
        .resolve_submission(&req.name, &req.email, &req.message)
        .await?;
    Ok(Json(resolved).into_response())
}

// ── Error mapping ───────────────────────────────────────────────────

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(Error::Store(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Ticket(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!(error = %self.0, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
