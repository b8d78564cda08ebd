// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tenant wallet API endpoints.
//!
//! Every route takes the tenant id as a path segment; the wallet is derived
//! on demand. Secrets (keys, credential secret and passphrase) never leave
//! the service.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::ProxyAuth,
    blockchain::{format_amount, WalletBalanceResponse, NATIVE_DECIMALS},
    error::ApiError,
    state::AppState,
    wallet::{GasOutcome, TenantSigner, WalletError},
};

/// Derived wallet address for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletAddressResponse {
    pub address: String,
    pub network: String,
    pub chain_id: u64,
}

/// Result of a gas check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GasResponse {
    pub address: String,
    /// "sufficient" or "topped_up".
    pub status: String,
    /// Balance before any top-up, in wei.
    pub balance_wei: String,
    pub balance_formatted: String,
    /// Amount sent, in wei (top-ups only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_up_wei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// Exchange credential handle. The secret and passphrase are never returned.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CredentialResponse {
    pub address: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignMessageRequest {
    /// UTF-8 message to sign as an EIP-191 personal message.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignMessageResponse {
    pub address: String,
    /// 65-byte signature, 0x-prefixed hex.
    pub signature: String,
}

/// Get the derived wallet address for a tenant.
#[utoipa::path(
    get,
    path = "/v1/wallets/{tenant_id}",
    tag = "Wallets",
    security(("api_key" = [])),
    params(("tenant_id" = String, Path, description = "Opaque tenant identifier")),
    responses(
        (status = 200, description = "Derived address", body = WalletAddressResponse),
        (status = 400, description = "Invalid tenant id"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_wallet(
    _auth: ProxyAuth,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<WalletAddressResponse>, ApiError> {
    let signer = state.wallet.get_signer(&tenant_id).await?;
    let address = signer.address().await.map_err(WalletError::from)?;
    let network = state.wallet.network();

    Ok(Json(WalletAddressResponse {
        address: address.to_string(),
        network: network.name.to_string(),
        chain_id: network.chain_id,
    }))
}

/// Get native and collateral balances for a tenant's wallet.
#[utoipa::path(
    get,
    path = "/v1/wallets/{tenant_id}/balance",
    tag = "Wallets",
    security(("api_key" = [])),
    params(("tenant_id" = String, Path, description = "Opaque tenant identifier")),
    responses(
        (status = 200, description = "Wallet balances", body = WalletBalanceResponse),
        (status = 400, description = "Invalid tenant id"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "RPC failure")
    )
)]
pub async fn get_balance(
    _auth: ProxyAuth,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    Ok(Json(state.wallet.balances(&tenant_id).await?))
}

/// Make sure the tenant's wallet holds enough gas, topping up if needed.
#[utoipa::path(
    post,
    path = "/v1/wallets/{tenant_id}/gas",
    tag = "Wallets",
    security(("api_key" = [])),
    params(("tenant_id" = String, Path, description = "Opaque tenant identifier")),
    responses(
        (status = 200, description = "Wallet is funded", body = GasResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Top-up or RPC failure"),
        (status = 503, description = "Master account cannot fund top-ups"),
        (status = 504, description = "Top-up not confirmed in time")
    )
)]
pub async fn ensure_gas(
    _auth: ProxyAuth,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<GasResponse>, ApiError> {
    let outcome = state.wallet.ensure_gas_balance(&tenant_id).await?;

    let response = match outcome {
        GasOutcome::Sufficient { address, balance } => GasResponse {
            address: address.to_string(),
            status: "sufficient".to_string(),
            balance_wei: balance.to_string(),
            balance_formatted: format_amount(balance, NATIVE_DECIMALS),
            top_up_wei: None,
            tx_hash: None,
            block_number: None,
            explorer_url: None,
        },
        GasOutcome::ToppedUp {
            address,
            previous_balance,
            amount,
            tx_hash,
            block_number,
        } => {
            let tx_hash = tx_hash.to_string();
            GasResponse {
                address: address.to_string(),
                status: "topped_up".to_string(),
                balance_wei: previous_balance.to_string(),
                balance_formatted: format_amount(previous_balance, NATIVE_DECIMALS),
                top_up_wei: Some(amount.to_string()),
                explorer_url: state.wallet.network().tx_url(&tx_hash),
                tx_hash: Some(tx_hash),
                block_number: Some(block_number),
            }
        }
    };

    Ok(Json(response))
}

/// Derive (or fetch cached) exchange credentials for a tenant.
#[utoipa::path(
    post,
    path = "/v1/wallets/{tenant_id}/credentials",
    tag = "Wallets",
    security(("api_key" = [])),
    params(("tenant_id" = String, Path, description = "Opaque tenant identifier")),
    responses(
        (status = 200, description = "Credential ready", body = CredentialResponse),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Exchange rejected or returned a malformed credential")
    )
)]
pub async fn derive_credentials(
    _auth: ProxyAuth,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let session = state.wallet.session(&tenant_id).await?;
    let address = session
        .signer
        .address()
        .await
        .map_err(WalletError::from)?;

    Ok(Json(CredentialResponse {
        address: address.to_string(),
        api_key: session.credentials.key,
    }))
}

/// Sign a personal message with the tenant's derived key.
#[utoipa::path(
    post,
    path = "/v1/wallets/{tenant_id}/sign",
    tag = "Wallets",
    security(("api_key" = [])),
    params(("tenant_id" = String, Path, description = "Opaque tenant identifier")),
    request_body = SignMessageRequest,
    responses(
        (status = 200, description = "Signature", body = SignMessageResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn sign_message(
    _auth: ProxyAuth,
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(request): Json<SignMessageRequest>,
) -> Result<Json<SignMessageResponse>, ApiError> {
    if request.message.is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let signer = state.wallet.get_signer(&tenant_id).await?;
    let signature = signer
        .sign_message(request.message.as_bytes())
        .await
        .map_err(WalletError::from)?;
    let address = signer.address().await.map_err(WalletError::from)?;

    Ok(Json(SignMessageResponse {
        address: address.to_string(),
        signature: alloy::primitives::hex::encode_prefixed(signature.as_bytes()),
    }))
}
