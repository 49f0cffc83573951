use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::governor::{DiagnosticsReport, Governor, GovernorState};
use crate::recovery::RecoveryPhase;

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub governor: Arc<Governor>,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(governor: Arc<Governor>, token: String) -> Self {
        Self {
            governor,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token"),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active: bool,
    pub monitoring: bool,
    pub throttling: bool,
    pub recovery_phase: RecoveryPhase,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(governor_state))
        .route("/diagnostics", get(diagnostics))
        .route("/events", get(events_stream_handler))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let snapshot = state.governor.get_state();
    Ok(Json(HealthResponse {
        status: "ok",
        active: snapshot.active,
        monitoring: state.governor.is_monitoring(),
        throttling: snapshot.is_throttling,
        recovery_phase: snapshot.recovery_phase,
    }))
}

pub async fn governor_state(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<GovernorState>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.governor.get_state()))
}

pub async fn diagnostics(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<DiagnosticsReport>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.governor.diagnostics()))
}

pub async fn events_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::GovernorEventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::governor_events(&state.governor))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
