//! REST API handlers for the booking gateway.
//!
//! Every store-touching route goes through the same admission pipeline:
//! identity → rate limit → store. Denials short-circuit before the store
//! is touched.

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, warn};

use super::{AppState, FALLBACK_REPLY};
use crate::identity::{resolve_identity, ClientIdentity};
use crate::sessions::{AdmissionError, Message, SessionStoreError};
use crate::throttle::RateDecision;

// ── Request bodies ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

// ── Error mapping ────────────────────────────────────────────────

fn rate_limited_response(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs().max(1);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, secs.to_string())],
        Json(serde_json::json!({
            "error": format!("Rate limit exceeded. Retry after {secs} seconds.")
        })),
    )
        .into_response()
}

fn admission_error_response(err: &AdmissionError) -> Response {
    let status = match err {
        AdmissionError::OverGlobalCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AdmissionError::OverPerIdentityQuota { .. } => StatusCode::TOO_MANY_REQUESTS,
        AdmissionError::SessionMessageLimitExceeded { .. } => StatusCode::CONFLICT,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

fn store_error_response(state: &AppState, err: &SessionStoreError) -> Response {
    match err {
        SessionStoreError::Admission(e) => {
            state.metrics.admission_rejected.inc();
            admission_error_response(e)
        }
        SessionStoreError::UnknownOrExpired { .. } => not_found_response(),
    }
}

fn not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Session not found" })),
    )
        .into_response()
}

/// Rate-limit gate shared by every store-touching route. Returns the
/// resolved identity, or the 429 short-circuit with zero store side
/// effects.
async fn admit(
    state: &AppState,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Result<ClientIdentity, Response> {
    let identity = resolve_identity(headers, peer, state.config.gateway.trust_forwarded_headers);
    match state.limiter.allow(&identity).await {
        RateDecision::Allowed { .. } => Ok(identity),
        RateDecision::Denied { retry_after } => {
            state.metrics.rate_limited.inc();
            warn!(identity = %identity, "request rate limited");
            Err(rate_limited_response(retry_after))
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────

/// POST /api/chat — one conversation turn through the admission pipeline.
pub async fn handle_chat(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Response {
    let identity = match admit(&state, &headers, peer).await {
        Ok(identity) => identity,
        Err(denied) => return denied,
    };

    let session_id = body
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Err(err) = state.store.get_or_create(&session_id, &identity).await {
        state.metrics.admission_rejected.inc();
        warn!(session_id = %session_id, error = %err, "session admission refused");
        return admission_error_response(&err);
    }

    let mut user_message = Message::user(body.message.as_str());
    user_message.metadata = body.metadata;
    if let Err(err) = state.store.append_message(&session_id, user_message).await {
        return store_error_response(&state, &err);
    }

    // Snapshot for the responder, taken after the user turn landed.
    let session = match state.store.get(&session_id).await {
        Ok(session) => session,
        Err(err) => return store_error_response(&state, &err),
    };

    // External call; no store lock is held across it.
    let reply = match &state.responder {
        Some(responder) => match responder.respond(&session, &body.message).await {
            Ok(text) => text,
            Err(err) => {
                error!(session_id = %session_id, error = %err, "responder failed");
                FALLBACK_REPLY.to_string()
            }
        },
        None => FALLBACK_REPLY.to_string(),
    };

    // A full session still gets its reply; the turn is just not retained.
    if let Err(err) = state
        .store
        .append_message(&session_id, Message::assistant(reply.as_str()))
        .await
    {
        warn!(session_id = %session_id, error = %err, "assistant turn not retained");
    }

    Json(serde_json::json!({
        "response": reply,
        "session_id": session_id,
    }))
    .into_response()
}

/// GET /api/session/{id} — session history by session ID.
pub async fn handle_session_get(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = admit(&state, &headers, peer).await {
        return denied;
    }

    match state.store.get(&id).await {
        Ok(session) => Json(serde_json::json!({
            "session_id": session.id,
            "messages": session.messages,
            "message_count": session.messages.len(),
        }))
        .into_response(),
        Err(err) => store_error_response(&state, &err),
    }
}

/// DELETE /api/session/{id} — delete a session and its history.
pub async fn handle_session_delete(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(denied) = admit(&state, &headers, peer).await {
        return denied;
    }

    if state.store.remove(&id).await {
        Json(serde_json::json!({
            "message": format!("Session {id} deleted successfully")
        }))
        .into_response()
    } else {
        not_found_response()
    }
}

/// GET /api/sessions — list all live sessions.
pub async fn handle_sessions_list(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = admit(&state, &headers, peer).await {
        return denied;
    }

    let sessions = state.store.list().await;
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

/// GET /api/health — service status overview.
pub async fn handle_health(State(state): State<AppState>) -> Response {
    let health = crate::health::snapshot();
    Json(serde_json::json!({
        "status": health.status,
        "timestamp": health.timestamp,
        "service": state.config.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": health.uptime_seconds,
    }))
    .into_response()
}

/// GET /metrics — Prometheus text exposition.
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    state.metrics.sessions_active.set(state.store.len() as i64);
    match state.metrics.encode() {
        Ok(text) => text.into_response(),
        Err(err) => {
            error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
