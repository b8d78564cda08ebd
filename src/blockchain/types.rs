// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// EVM network profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Symbol of the native gas token
    pub native_symbol: &'static str,
    /// Public RPC endpoint used when none is configured
    pub default_rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Polygon PoS mainnet configuration.
pub const POLYGON_MAINNET: NetworkConfig = NetworkConfig {
    name: "Polygon PoS",
    chain_id: 137,
    native_symbol: "POL",
    default_rpc_url: "https://polygon-rpc.com",
    explorer_url: "https://polygonscan.com",
};

/// Polygon Amoy testnet configuration.
pub const POLYGON_AMOY: NetworkConfig = NetworkConfig {
    name: "Polygon Amoy Testnet",
    chain_id: 80002,
    native_symbol: "POL",
    default_rpc_url: "https://rpc-amoy.polygon.technology",
    explorer_url: "https://amoy.polygonscan.com",
};

/// Native token decimals on every supported EVM network.
pub const NATIVE_DECIMALS: u8 = 18;

/// USDC.e on Polygon PoS, the exchange's collateral token.
pub const POLYGON_COLLATERAL_TOKEN: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";

/// Decimals of the collateral token.
pub const COLLATERAL_DECIMALS: u8 = 6;

impl NetworkConfig {
    /// Resolve the profile for a chain id.
    ///
    /// Unknown chain ids get a generic profile; the caller supplies the RPC URL.
    pub fn for_chain_id(chain_id: u64) -> Self {
        match chain_id {
            137 => POLYGON_MAINNET,
            80002 => POLYGON_AMOY,
            other => NetworkConfig {
                name: "Custom EVM network",
                chain_id: other,
                native_symbol: "ETH",
                default_rpc_url: POLYGON_MAINNET.default_rpc_url,
                explorer_url: "",
            },
        }
    }

    /// Explorer link for a transaction hash, if the network has an explorer.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.explorer_url.is_empty() {
            None
        } else {
            Some(format!("{}/tx/{}", self.explorer_url, tx_hash))
        }
    }
}

/// Token balance information.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenBalance {
    /// Token symbol (e.g., "POL", "USDC.e")
    pub symbol: String,
    /// Balance in smallest unit (wei for native, token decimals for ERC-20)
    pub balance_raw: String,
    /// Balance formatted with decimals
    pub balance_formatted: String,
    /// Number of decimals
    pub decimals: u8,
    /// Contract address (None for native token)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

/// Wallet balance response including native and collateral balances.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletBalanceResponse {
    /// Wallet address
    pub address: String,
    /// Network name
    pub network: String,
    /// Chain ID
    pub chain_id: u64,
    /// Native gas token balance
    pub native_balance: TokenBalance,
    /// Collateral token balance (absent when the token read failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collateral_balance: Option<TokenBalance>,
}
