// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{process::ExitCode, sync::Arc};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use polyproxy_wallet::{
    api::router,
    config::Settings,
    logging,
    state::AppState,
    wallet::{HealthMonitor, WalletService},
};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(Default::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(settings.log_format);

    let wallet = match WalletService::from_settings(&settings) {
        Ok(wallet) => Arc::new(wallet),
        Err(e) => {
            error!(error = %e, stage = %e.stage(), "Failed to initialize wallet service");
            return ExitCode::FAILURE;
        }
    };

    match wallet.master_address().await {
        Ok(master) => info!(
            master = %master,
            network = wallet.network().name,
            chain_id = wallet.network().chain_id,
            "Wallet service ready"
        ),
        Err(e) => {
            error!(error = %e, "Master key is unusable");
            return ExitCode::FAILURE;
        }
    }
    if settings.api_key.is_none() {
        tracing::warn!("PROXY_API_KEY is not set; API authentication is disabled");
    }

    let shutdown = CancellationToken::new();
    let monitor = HealthMonitor::new(wallet.custodian(), settings.health_check_interval);
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

    let app = router(AppState::new(wallet, settings.api_key.as_deref()));

    let addr = settings.bind_address();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %addr, "Polyproxy wallet listening on http://{addr} (docs at /docs)");

    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
                _ = server_shutdown.cancelled() => {}
            }
        })
        .await;

    shutdown.cancel();
    HealthMonitor::join(monitor_task).await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
