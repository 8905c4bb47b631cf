// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status.
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Federated signing key cache ("cached" or "empty").
    /// Only present when Azure AD federation is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<String>,
}

/// Report the signing key cache without triggering a fetch, so health
/// probes never spend the key-fetch rate limit.
fn check_signing_keys(state: &AppState) -> Option<String> {
    state.auth.signing_keys().map(|keys| {
        if keys.is_empty() { "empty" } else { "cached" }.to_string()
    })
}

/// Health check endpoint handler. Always reachable without a token.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            signing_keys: check_signing_keys(&state),
        },
    })
}
