// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: an in-memory chain, a scripted credential
//! source and a fully wired wallet service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::{
    consensus::{transaction::SignerRecoverable, Transaction, TxEnvelope},
    eips::eip2718::Decodable2718,
    primitives::{keccak256, Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::blockchain::{ChainError, ChainProvider, TxReceipt, POLYGON_MAINNET};
use crate::wallet::{
    CredentialError, CredentialSource, GasPolicy, MasterSecret, TenantSigner, WalletService,
};

pub const MASTER_HEX: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn master_secret() -> MasterSecret {
    MasterSecret::from_hex(MASTER_HEX).expect("valid test master secret")
}

pub fn wei(amount: u64) -> U256 {
    U256::from(amount)
}

/// Gas price reported by [`MockChain`] unless overridden, in wei.
pub const DEFAULT_GAS_PRICE: u64 = 1;

/// Fee of a plain transfer at [`DEFAULT_GAS_PRICE`].
pub const TRANSFER_FEE: u64 = 21_000 * DEFAULT_GAS_PRICE;

/// Transfer observed by [`MockChain`].
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub tx_hash: TxHash,
}

/// In-memory chain: balances, decoded transfers, injectable failures.
///
/// A broadcast debits the sender `value + gas_limit * fee` and fails when the
/// sender cannot cover it.
pub struct MockChain {
    balances: Mutex<HashMap<Address, U256>>,
    transfers: Mutex<Vec<RecordedTransfer>>,
    nonce: AtomicU64,
    gas_price: AtomicU64,
    balance_reads: AtomicUsize,
    send_delay: Mutex<Duration>,
    fail_sends: AtomicBool,
    never_confirm: AtomicBool,
    revert: AtomicBool,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            transfers: Mutex::new(Vec::new()),
            nonce: AtomicU64::new(0),
            gas_price: AtomicU64::new(DEFAULT_GAS_PRICE),
            balance_reads: AtomicUsize::new(0),
            send_delay: Mutex::new(Duration::ZERO),
            fail_sends: AtomicBool::new(false),
            never_confirm: AtomicBool::new(false),
            revert: AtomicBool::new(false),
        }
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.balances.lock().unwrap().insert(address, balance);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }

    pub fn set_gas_price(&self, wei: u64) {
        self.gas_price.store(wei, Ordering::SeqCst);
    }

    /// Delay every broadcast, widening race windows in concurrency tests.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = delay;
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn never_confirm(&self) {
        self.never_confirm.store(true, Ordering::SeqCst);
    }

    pub fn revert_transactions(&self) {
        self.revert.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(POLYGON_MAINNET.chain_id)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance_of(address))
    }

    async fn get_gas_price(&self) -> Result<u128, ChainError> {
        Ok(u128::from(self.gas_price.load(Ordering::SeqCst)))
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ChainError> {
        Ok(self.nonce.fetch_add(1, Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64, ChainError> {
        Ok(21_000)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        let delay = *self.send_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("replacement transaction underpriced".into()));
        }

        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| ChainError::Rpc(format!("undecodable transaction: {e}")))?;
        let to = envelope
            .to()
            .ok_or_else(|| ChainError::Rpc("contract creation not supported".into()))?;
        let from = envelope
            .recover_signer()
            .map_err(|e| ChainError::Rpc(format!("invalid signature: {e}")))?;
        let value = envelope.value();
        let fee = U256::from(envelope.gas_limit()) * U256::from(envelope.max_fee_per_gas());
        let tx_hash = keccak256(raw);

        {
            let mut balances = self.balances.lock().unwrap();
            let available = balances.get(&from).copied().unwrap_or(U256::ZERO);
            let cost = value + fee;
            if available < cost {
                return Err(ChainError::Rpc(format!(
                    "insufficient funds for gas * price + value: have {available} want {cost}"
                )));
            }
            balances.insert(from, available - cost);
            *balances.entry(to).or_insert(U256::ZERO) += value;
        }
        self.transfers.lock().unwrap().push(RecordedTransfer {
            from,
            to,
            value,
            tx_hash,
        });
        Ok(tx_hash)
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        if self.never_confirm.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Err(ChainError::ConfirmationTimeout(tx_hash));
        }
        if self.revert.load(Ordering::SeqCst) {
            return Err(ChainError::Reverted(tx_hash));
        }
        Ok(TxReceipt {
            tx_hash,
            block_number: 1,
            gas_used: 21_000,
            success: true,
        })
    }

    async fn token_balance(&self, _token: Address, _holder: Address) -> Result<U256, ChainError> {
        Ok(U256::from(2_500_000u64))
    }
}

/// Credential source returning scripted responses and counting calls.
pub struct ScriptedCredentials {
    responses: Mutex<Vec<Result<Value, CredentialError>>>,
    calls: AtomicUsize,
}

impl ScriptedCredentials {
    /// Always answers with a well-formed canonical response.
    pub fn healthy() -> Self {
        Self::new(Vec::new())
    }

    /// Answers with `responses` in order, then with the healthy default.
    pub fn new(responses: Vec<Result<Value, CredentialError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn canonical_credential_json() -> Value {
    json!({
        "apiKey": "4f1e2d3c-0000-4000-8000-000000000001",
        "secret": "q83vEjRWeJCrze8SNFZ4kA==",
        "passphrase": "s3cr3t-phrase"
    })
}

#[async_trait]
impl CredentialSource for ScriptedCredentials {
    async fn derive_or_create(&self, signer: &dyn TenantSigner) -> Result<Value, CredentialError> {
        signer
            .address()
            .await
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(canonical_credential_json()))
    }
}

pub fn test_policy() -> GasPolicy {
    GasPolicy {
        low_balance_threshold: wei(1_000),
        top_up_amount: wei(5_000),
        master_alert_threshold: wei(50_000),
        rpc_timeout: Duration::from_secs(2),
        confirmation_timeout: Duration::from_millis(200),
    }
}

/// Wallet service wired to a fresh [`MockChain`] and credential script.
pub fn test_service(
    credentials: Arc<ScriptedCredentials>,
) -> (Arc<WalletService>, Arc<MockChain>) {
    let chain = Arc::new(MockChain::new());
    let service = WalletService::from_parts(
        master_secret(),
        chain.clone(),
        credentials,
        test_policy(),
        64,
        POLYGON_MAINNET,
        Address::repeat_byte(0xcc),
    )
    .expect("test service builds");
    (Arc::new(service), chain)
}
