// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::API_KEY_HEADER,
    blockchain::{TokenBalance, WalletBalanceResponse},
    error::ErrorBody,
    state::AppState,
};

pub mod health;
pub mod master;
pub mod wallets;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallets/{tenant_id}", get(wallets::get_wallet))
        .route("/wallets/{tenant_id}/balance", get(wallets::get_balance))
        .route("/wallets/{tenant_id}/gas", post(wallets::ensure_gas))
        .route(
            "/wallets/{tenant_id}/credentials",
            post(wallets::derive_credentials),
        )
        .route("/wallets/{tenant_id}/sign", post(wallets::sign_message))
        .route("/master/health", get(master::master_health));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        wallets::get_wallet,
        wallets::get_balance,
        wallets::ensure_gas,
        wallets::derive_credentials,
        wallets::sign_message,
        master::master_health
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            wallets::WalletAddressResponse,
            wallets::GasResponse,
            wallets::CredentialResponse,
            wallets::SignMessageRequest,
            wallets::SignMessageResponse,
            master::MasterHealthResponse,
            WalletBalanceResponse,
            TokenBalance,
            ErrorBody
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Wallets", description = "Per-tenant derived wallets"),
        (name = "Master", description = "Master funding account")
    )
)]
struct ApiDoc;
