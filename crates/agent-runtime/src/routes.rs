//! # HTTP Route Table
//!
//! One `POST /api/v1/<route>` per message type. The body is the raw JSON
//! payload; the route names its type, so the transport never guesses.
//!
//! | Outcome | Status |
//! |---|---|
//! | handled | 200 `{"message": <reply or null>}` |
//! | `NotFound`, `ReferenceNotFound`, `Unhandled`, unknown route | 404 |
//! | `AlreadyExists`, `InvalidStateTransition` | 409 |
//! | `MalformedContent`, `FailedAck` | 400 |
//! | `RemoteDeliveryFailed`, `Resolution` | 502 |
//! | storage, serialization, initiate | 500 |

use std::sync::Arc;

use agent_core::{AgentError, AgentService, Message, MessageType};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AgentService>,
}

/// Build the agent's router.
pub fn build_router(service: Arc<AgentService>) -> Router {
    Router::new()
        .route("/api/v1/:route", post(handle_message))
        .route("/health", get(health_check))
        .with_state(AppState { service })
}

/// Transport-facing error.
#[derive(Debug)]
pub enum ApiError {
    UnknownRoute(String),
    Agent(AgentError),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError::Agent(err)
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::NotFound { .. }
        | AgentError::ReferenceNotFound { .. }
        | AgentError::Unhandled(_) => StatusCode::NOT_FOUND,
        AgentError::AlreadyExists { .. } | AgentError::InvalidStateTransition { .. } => {
            StatusCode::CONFLICT
        }
        AgentError::MalformedContent { .. } | AgentError::FailedAck { .. } => {
            StatusCode::BAD_REQUEST
        }
        AgentError::RemoteDeliveryFailed { .. } | AgentError::Resolution { .. } => {
            StatusCode::BAD_GATEWAY
        }
        AgentError::Storage(_) | AgentError::Serialization(_) | AgentError::Initiate { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownRoute(route) => (
                StatusCode::NOT_FOUND,
                format!("unknown message route: {}", route),
            ),
            ApiError::Agent(err) => (status_for(&err), err.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn handle_message(
    State(state): State<AppState>,
    Path(route): Path<String>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let message_type =
        MessageType::from_route(&route).ok_or_else(|| ApiError::UnknownRoute(route.clone()))?;

    let content = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| AgentError::MalformedContent {
            message_type,
            reason: format!("invalid JSON: {}", e),
        })?
    };

    let message = Message::decode(message_type, content)?;
    debug!("[http] {} decoded", message_type);

    let reply = state
        .service
        .serve(message)
        .await
        .and_then(|response| response.into_reply())
        .map_err(|err| {
            warn!("[http] {} failed: {}", message_type, err);
            err
        })?;

    Ok(Json(json!({ "message": reply })))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "did-agent",
        "controllers": state.service.controller_names(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
