// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::wallet::{CredentialError, GasError, SignerError, WalletError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Failed pipeline stage, for wallet errors.
    pub stage: Option<&'static str>,
    pub retryable: bool,
}

/// Error body returned by every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    retryable: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            stage: None,
            retryable: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

fn status_for(err: &WalletError) -> StatusCode {
    match err {
        WalletError::InvalidTenant(_) => StatusCode::BAD_REQUEST,
        WalletError::Signer(SignerError::UnsupportedOperation(_) | SignerError::MissingProvider) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WalletError::Gas(GasError::InsufficientMasterFunds { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        WalletError::Gas(GasError::ConfirmationTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        WalletError::Credential(CredentialError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        WalletError::Credential(_)
        | WalletError::Gas(GasError::BalanceRead(_) | GasError::GasPriceRead(_) | GasError::TopUpFailed(_))
        | WalletError::Chain(_)
        | WalletError::Signer(SignerError::Provider(_)) => StatusCode::BAD_GATEWAY,
        WalletError::Signer(_) | WalletError::Gas(_) | WalletError::Configuration(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::warn!(stage = %err.stage(), error = %err, "Wallet operation failed");
        }
        Self {
            status,
            message: err.to_string(),
            stage: Some(err.stage().as_str()),
            retryable: err.is_retryable(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            stage: self.stage.map(str::to_string),
            retryable: self.retryable,
        });
        (self.status, body).into_response()
    }
}
