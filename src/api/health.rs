// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
    /// Tenant signers currently cached.
    pub cached_tenants: usize,
    /// Key derivations performed since startup.
    pub derivations: u64,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// RPC endpoint reachability ("ok", "wrong_chain" or "unavailable").
    pub rpc: String,
    /// Master account funding from the last periodic check
    /// ("ok", "low" or "unchecked").
    /// A low master balance is reported but does not fail readiness.
    pub master_balance: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_rpc(state: &AppState) -> String {
    let expected = state.wallet.network().chain_id;
    match state.wallet.provider().chain_id().await {
        Ok(id) if id == expected => "ok",
        Ok(id) => {
            tracing::warn!(expected, reported = id, "RPC endpoint serves a different chain");
            "wrong_chain"
        }
        Err(e) => {
            tracing::warn!(error = %e, "RPC endpoint unreachable");
            "unavailable"
        }
    }
    .to_string()
}

fn check_master(state: &AppState) -> String {
    match state.wallet.last_master_health() {
        Some(health) if health.below_alert_threshold => "low",
        Some(_) => "ok",
        None => "unchecked",
    }
    .to_string()
}

/// Health check endpoint handler.
///
/// Returns 200 when the RPC endpoint is usable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let rpc = check_rpc(&state).await;
    let master_balance = check_master(&state);
    let all_ok = rpc == "ok";

    let response = ReadyResponse {
        status: if all_ok && master_balance != "low" {
            "ok"
        } else {
            "degraded"
        }
        .to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            rpc,
            master_balance,
        },
        cached_tenants: state.wallet.cached_tenants(),
        derivations: state.wallet.derivation_count(),
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}
