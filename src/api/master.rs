// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Master (funding) account endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::ProxyAuth,
    blockchain::{format_amount, NATIVE_DECIMALS},
    error::ApiError,
    state::AppState,
};

/// Master account balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MasterHealthResponse {
    pub address: String,
    pub balance_wei: String,
    pub balance_formatted: String,
    pub alert_threshold_wei: String,
    /// True when operators should refill the master account.
    pub below_alert_threshold: bool,
}

/// Check the master account balance against the alert threshold.
#[utoipa::path(
    get,
    path = "/v1/master/health",
    tag = "Master",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Master balance snapshot", body = MasterHealthResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "RPC failure")
    )
)]
pub async fn master_health(
    _auth: ProxyAuth,
    State(state): State<AppState>,
) -> Result<Json<MasterHealthResponse>, ApiError> {
    let health = state.wallet.check_master_health().await?;

    Ok(Json(MasterHealthResponse {
        address: health.address.to_string(),
        balance_wei: health.balance.to_string(),
        balance_formatted: format_amount(health.balance, NATIVE_DECIMALS),
        alert_threshold_wei: health.alert_threshold.to_string(),
        below_alert_threshold: health.below_alert_threshold,
    }))
}
