// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for orchestrator authentication.
//!
//! Add `ProxyAuth` to a handler's arguments to require the shared key:
//!
//! ```rust,ignore
//! async fn my_handler(_auth: ProxyAuth, State(state): State<AppState>) -> impl IntoResponse {
//!     // only reached with a valid x-api-key
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, API_KEY_HEADER};
use crate::state::AppState;

/// Proof that the request carried a valid API key (or auth is disabled).
pub struct ProxyAuth;

impl FromRequestParts<AppState> for ProxyAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(verifier) = &state.auth else {
            return Ok(ProxyAuth);
        };

        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .ok_or(AuthError::MissingApiKey)?
            .to_str()
            .map_err(|_| AuthError::InvalidApiKey)?;

        if verifier.verify(presented) {
            Ok(ProxyAuth)
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }
}
