//! HTTP request handlers
//!
//! Read-only status surface. Every handler requires a valid session token
//! but none require the privileged gate, and none acquire operation locks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::authn::Identity;
use crate::models::stack::{StackContainer, StackStatus};
use crate::server::state::ServerState;
use crate::stacks::status::stack_status;
use crate::telemetry::collect_metrics;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "bosun".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Metrics handler
pub async fn metrics_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    bearer_identity(&state, &headers).await?;
    Ok(Json(collect_metrics()))
}

/// Stack summary for list and detail views
#[derive(Debug, Serialize)]
pub struct StackSummary {
    pub id: String,
    pub name: String,
    pub status: StackStatus,
    pub container_count: usize,
    pub running_count: usize,
}

/// Stacks list response
#[derive(Debug, Serialize)]
pub struct StacksResponse {
    pub stacks: Vec<StackSummary>,
    pub total: usize,
}

/// Stacks list handler
pub async fn stacks_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    bearer_identity(&state, &headers).await?;

    let stacks = state
        .stacks
        .load_all()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let summaries: Vec<StackSummary> = stacks
        .iter()
        .map(|stack| summarize(&state, &stack.id, &stack.name))
        .collect();

    let total = summaries.len();
    Ok(Json(StacksResponse {
        stacks: summaries,
        total,
    }))
}

/// Stack detail response
#[derive(Debug, Serialize)]
pub struct StackDetailResponse {
    #[serde(flatten)]
    pub summary: StackSummary,
    pub containers: Vec<StackContainer>,
}

/// Stack detail handler
pub async fn stack_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    bearer_identity(&state, &headers).await?;

    let stack = state
        .stacks
        .get(&id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    let containers = state.counts.get(&stack.id).containers;

    Ok(Json(StackDetailResponse {
        summary: summarize(&state, &stack.id, &stack.name),
        containers,
    }))
}

/// Audit log response
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub entries: Vec<crate::audit::AuditEntry>,
    pub total: usize,
}

/// Audit log handler
pub async fn audit_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    bearer_identity(&state, &headers).await?;

    let entries = state
        .audit
        .recent(100)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let total = entries.len();
    Ok(Json(AuditResponse { entries, total }))
}

fn summarize(state: &ServerState, id: &str, name: &str) -> StackSummary {
    let counts = state.counts.get(id);
    let running = counts.running();
    let total = counts.total();
    StackSummary {
        id: id.to_string(),
        name: name.to_string(),
        status: stack_status(
            running,
            total,
            state.activity.is_deploying(id),
            state.activity.last_attempt_failed(id),
        ),
        container_count: total,
        running_count: running,
    }
}

/// Resolve the bearer token on a request into an identity
pub async fn bearer_identity(
    state: &ServerState,
    headers: &HeaderMap,
) -> Result<Identity, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state
        .authorizer
        .authorize(token)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)
}
