// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC provider seam.
//!
//! Everything the wallet core needs from the chain goes through
//! [`ChainProvider`], so signers and the gas custodian can be bound to the
//! alloy-backed [`RpcProvider`](super::RpcProvider) in production and to an
//! in-memory chain in tests.

use std::time::Duration;

use alloy::{
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

/// Minimal blockchain provider contract.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Chain id reported by the node.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Native token balance in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Current legacy gas price in wei.
    async fn get_gas_price(&self) -> Result<u128, ChainError>;

    /// Next nonce for `address`, counting pending transactions.
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError>;

    /// Gas limit estimate for a transaction request.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError>;

    /// Broadcast an EIP-2718 encoded signed transaction.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError>;

    /// Wait until `tx_hash` is included, or fail with
    /// [`ChainError::ConfirmationTimeout`] once `timeout` elapses.
    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError>;

    /// ERC-20 `balanceOf(holder)` on `token`.
    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError>;
}

/// Transaction receipt after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block number where transaction was included
    pub block_number: u64,
    /// Gas actually used
    pub gas_used: u64,
    /// Whether the transaction was successful
    pub success: bool,
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("RPC call `{operation}` timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Transaction {0} was not confirmed before the timeout")]
    ConfirmationTimeout(TxHash),

    #[error("Transaction {0} reverted")]
    Reverted(TxHash),
}

impl ChainError {
    /// Whether repeating the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::Rpc(_) | ChainError::Timeout { .. } | ChainError::ConfirmationTimeout(_)
        )
    }
}
