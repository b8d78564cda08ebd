// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::ApiKeyVerifier;
use crate::wallet::WalletService;

#[derive(Clone)]
pub struct AppState {
    pub wallet: Arc<WalletService>,
    /// `None` disables API key checks.
    pub auth: Option<Arc<ApiKeyVerifier>>,
}

impl AppState {
    pub fn new(wallet: Arc<WalletService>, api_key: Option<&str>) -> Self {
        Self {
            wallet,
            auth: api_key.map(|key| Arc::new(ApiKeyVerifier::new(key))),
        }
    }
}
