// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Alloy HTTP client implementing [`ChainProvider`].

use std::future::Future;
use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, TxHash, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;

use super::erc20::Erc20Contract;
use super::provider::{ChainError, ChainProvider, TxReceipt};
use super::types::NetworkConfig;

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Interval between receipt polls while waiting for confirmation.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC client for the configured EVM network.
pub struct RpcProvider {
    /// Network configuration
    network: NetworkConfig,
    /// Alloy HTTP provider
    provider: HttpProvider,
    /// Upper bound for any single RPC call
    request_timeout: Duration,
    poll_interval: Duration,
}

impl RpcProvider {
    /// Create a new client for `network` talking to `rpc_url`.
    pub fn new(
        network: NetworkConfig,
        rpc_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, ChainError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self {
            network,
            provider,
            request_timeout,
            poll_interval: RECEIPT_POLL_INTERVAL,
        })
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Run an RPC future under the request timeout.
    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .map_err(|_| ChainError::Timeout {
                operation,
                after: self.request_timeout,
            })?
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let receipt = self
            .timed("eth_getTransactionReceipt", async {
                self.provider
                    .get_transaction_receipt(tx_hash)
                    .await
                    .map_err(|e| ChainError::Rpc(format!("Failed to get receipt: {}", e)))
            })
            .await?;

        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            block_number: r.block_number.unwrap_or(0),
            gas_used: r.gas_used,
            success: r.status(),
        }))
    }
}

#[async_trait]
impl ChainProvider for RpcProvider {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.timed("eth_chainId", async {
            self.provider
                .get_chain_id()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.timed("eth_getBalance", async {
            self.provider
                .get_balance(address)
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn get_gas_price(&self) -> Result<u128, ChainError> {
        self.timed("eth_gasPrice", async {
            self.provider
                .get_gas_price()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        self.timed("eth_getTransactionCount", async {
            self.provider
                .get_transaction_count(address)
                .pending()
                .await
                .map_err(|e| ChainError::Rpc(e.to_string()))
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError> {
        self.timed("eth_estimateGas", async {
            self.provider
                .estimate_gas(tx.clone())
                .await
                .map_err(|e| ChainError::Rpc(format!("Gas estimation failed: {}", e)))
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        self.timed("eth_sendRawTransaction", async {
            let pending = self
                .provider
                .send_raw_transaction(raw)
                .await
                .map_err(|e| ChainError::Rpc(format!("Failed to send: {}", e)))?;
            Ok(*pending.tx_hash())
        })
        .await
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        let poll = async {
            loop {
                match self.fetch_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {}
                    Err(e) if e.is_transient() => {
                        tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed, retrying");
                    }
                    Err(e) => return Err(e),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        let receipt = tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| ChainError::ConfirmationTimeout(tx_hash))??;

        if receipt.success {
            Ok(receipt)
        } else {
            Err(ChainError::Reverted(tx_hash))
        }
    }

    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError> {
        let contract = Erc20Contract::new(&self.provider, token);
        self.timed("eth_call(balanceOf)", contract.balance_of(holder))
            .await
    }
}
