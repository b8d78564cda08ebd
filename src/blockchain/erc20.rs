// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract reads.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::provider::ChainError;

// Only the read surface is needed; approvals are scripted elsewhere.
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: IERC20::new(address, provider.clone()),
        }
    }

    /// Get the raw balance of an address.
    pub async fn balance_of(&self, holder: Address) -> Result<U256, ChainError> {
        self.contract
            .balanceOf(holder)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }
}
