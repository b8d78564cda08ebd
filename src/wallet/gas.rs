// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gas Custody
//!
//! Keeps every tenant account funded with enough native token to transact,
//! topping up from the master account.
//!
//! ## Locking
//!
//! - A per-address async mutex covers the whole check, transfer and confirm
//!   sequence for one tenant. A caller queued behind a top-up re-reads the
//!   balance and finds it funded, so concurrent requests never double-fund.
//! - One master mutex covers "read master balance, then spend". The master
//!   must cover the top-up amount plus the transfer fee. The mutex is held
//!   until confirmation so the next top-up sees the spent balance and the
//!   next pending nonce.
//!
//! ## Timeouts
//!
//! Balance reads are bounded by the RPC timeout. The confirmation wait has its
//! own bound; running out of it is [`GasError::ConfirmationTimeout`], since
//! the transfer may still land and an operator should check before retrying.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};

use crate::blockchain::{
    format_amount, native_transfer, ChainError, ChainProvider, NATIVE_DECIMALS,
    NATIVE_TRANSFER_GAS,
};

use super::signer::{DerivedKeySigner, SignerError, TenantSigner};

/// Funding thresholds and timeouts.
#[derive(Debug, Clone)]
pub struct GasPolicy {
    /// Tenant balances strictly below this are topped up.
    pub low_balance_threshold: U256,
    /// Fixed amount sent per top-up.
    pub top_up_amount: U256,
    /// Master balances below this raise an operator warning.
    pub master_alert_threshold: U256,
    pub rpc_timeout: Duration,
    pub confirmation_timeout: Duration,
}

/// Result of [`GasCustodian::ensure_gas_balance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasOutcome {
    Sufficient {
        address: Address,
        balance: U256,
    },
    ToppedUp {
        address: Address,
        previous_balance: U256,
        amount: U256,
        tx_hash: TxHash,
        block_number: u64,
    },
}

impl GasOutcome {
    pub fn address(&self) -> Address {
        match self {
            GasOutcome::Sufficient { address, .. } | GasOutcome::ToppedUp { address, .. } => {
                *address
            }
        }
    }

    pub fn topped_up(&self) -> bool {
        matches!(self, GasOutcome::ToppedUp { .. })
    }
}

/// Master account balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterHealth {
    pub address: Address,
    pub balance: U256,
    pub alert_threshold: U256,
    pub below_alert_threshold: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GasError {
    #[error("Failed to read balance: {0}")]
    BalanceRead(ChainError),

    #[error("Failed to read gas price: {0}")]
    GasPriceRead(ChainError),

    #[error(
        "Master account has insufficient funds: required {required} wei, available {available} wei"
    )]
    InsufficientMasterFunds { required: U256, available: U256 },

    #[error("Top-up transfer failed: {0}")]
    TopUpFailed(String),

    #[error("Top-up {tx_hash} was broadcast but not confirmed in time")]
    ConfirmationTimeout { tx_hash: TxHash },

    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl GasError {
    /// Whether the caller can retry `ensure_gas_balance` without operator help.
    pub fn is_retryable(&self) -> bool {
        match self {
            GasError::BalanceRead(e) | GasError::GasPriceRead(e) => e.is_transient(),
            GasError::TopUpFailed(_) => true,
            GasError::InsufficientMasterFunds { .. }
            | GasError::ConfirmationTimeout { .. }
            | GasError::Signer(_) => false,
        }
    }
}

/// Per-address async locks, dropped once nobody holds or waits on them.
#[derive(Default)]
struct AddressLocks {
    locks: Mutex<HashMap<Address, Arc<tokio::sync::Mutex<()>>>>,
}

impl AddressLocks {
    async fn lock(&self, address: Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(address).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }
}

/// Funds tenant accounts from the master account.
pub struct GasCustodian {
    provider: Arc<dyn ChainProvider>,
    master: DerivedKeySigner,
    policy: GasPolicy,
    tenant_locks: AddressLocks,
    master_lock: tokio::sync::Mutex<()>,
    last_master_health: Mutex<Option<MasterHealth>>,
}

impl GasCustodian {
    /// `master` is rebound to `provider` so top-ups go through the same node.
    pub fn new(provider: Arc<dyn ChainProvider>, master: DerivedKeySigner, policy: GasPolicy) -> Self {
        let master = master.connect(Arc::clone(&provider));
        Self {
            provider,
            master,
            policy,
            tenant_locks: AddressLocks::default(),
            master_lock: tokio::sync::Mutex::new(()),
            last_master_health: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &GasPolicy {
        &self.policy
    }

    pub async fn master_address(&self) -> Result<Address, GasError> {
        Ok(self.master.address().await?)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        tokio::time::timeout(self.policy.rpc_timeout, call)
            .await
            .map_err(|_| ChainError::Timeout {
                operation,
                after: self.policy.rpc_timeout,
            })?
    }

    async fn read_balance(&self, address: Address) -> Result<U256, GasError> {
        self.timed("get_balance", self.provider.get_balance(address))
            .await
            .map_err(GasError::BalanceRead)
    }

    /// Top up `signer`'s account if it is below the low-balance threshold.
    ///
    /// Never reports success while the account is still underfunded.
    pub async fn ensure_gas_balance(&self, signer: &dyn TenantSigner) -> Result<GasOutcome, GasError> {
        let address = signer.address().await?;
        let _tenant_guard = self.tenant_locks.lock(address).await;

        let balance = self.read_balance(address).await?;
        if balance >= self.policy.low_balance_threshold {
            return Ok(GasOutcome::Sufficient { address, balance });
        }

        let _master_guard = self.master_lock.lock().await;
        let master_address = self.master.address().await?;
        let master_balance = self.read_balance(master_address).await?;
        let gas_price = self
            .timed("get_gas_price", self.provider.get_gas_price())
            .await
            .map_err(GasError::GasPriceRead)?;
        let amount = self.policy.top_up_amount;
        let required = amount + U256::from(NATIVE_TRANSFER_GAS) * U256::from(gas_price);

        if master_balance < required {
            error!(
                master = %master_address,
                available = %format_amount(master_balance, NATIVE_DECIMALS),
                required = %format_amount(required, NATIVE_DECIMALS),
                "Master account cannot cover top-up"
            );
            return Err(GasError::InsufficientMasterFunds {
                required,
                available: master_balance,
            });
        }

        let mut transfer = native_transfer(address, amount);
        transfer.gas_price = Some(gas_price);
        let tx_hash = self
            .master
            .send_transaction(transfer)
            .await
            .map_err(|e| {
                warn!(address = %address, error = %e, "Top-up broadcast failed");
                GasError::TopUpFailed(e.to_string())
            })?;

        let receipt = match self
            .provider
            .wait_for_confirmation(tx_hash, self.policy.confirmation_timeout)
            .await
        {
            Ok(receipt) => receipt,
            Err(ChainError::ConfirmationTimeout(tx_hash)) => {
                warn!(address = %address, tx_hash = %tx_hash, "Top-up confirmation timed out");
                return Err(GasError::ConfirmationTimeout { tx_hash });
            }
            Err(e) => {
                warn!(address = %address, tx_hash = %tx_hash, error = %e, "Top-up failed");
                return Err(GasError::TopUpFailed(e.to_string()));
            }
        };

        info!(
            address = %address,
            previous_balance = %format_amount(balance, NATIVE_DECIMALS),
            amount = %format_amount(amount, NATIVE_DECIMALS),
            tx_hash = %tx_hash,
            block = receipt.block_number,
            "Topped up tenant gas"
        );

        Ok(GasOutcome::ToppedUp {
            address,
            previous_balance: balance,
            amount,
            tx_hash,
            block_number: receipt.block_number,
        })
    }

    /// Read the master balance and warn when it drops below the alert threshold.
    pub async fn check_master_health(&self) -> Result<MasterHealth, GasError> {
        let address = self.master.address().await?;
        let balance = self.read_balance(address).await?;
        let below = balance < self.policy.master_alert_threshold;

        if below {
            warn!(
                master = %address,
                balance = %format_amount(balance, NATIVE_DECIMALS),
                alert_threshold = %format_amount(self.policy.master_alert_threshold, NATIVE_DECIMALS),
                "Master account balance is below the alert threshold"
            );
        } else {
            info!(
                master = %address,
                balance = %format_amount(balance, NATIVE_DECIMALS),
                "Master account balance healthy"
            );
        }

        let health = MasterHealth {
            address,
            balance,
            alert_threshold: self.policy.master_alert_threshold,
            below_alert_threshold: below,
        };
        *self
            .last_master_health
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(health.clone());
        Ok(health)
    }

    /// Result of the latest successful [`Self::check_master_health`], if any.
    pub fn last_master_health(&self) -> Option<MasterHealth> {
        self.last_master_health
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{master_secret, test_policy, wei, MockChain, TRANSFER_FEE};
    use crate::wallet::kdf::{derive, TenantId};

    struct Fixture {
        chain: Arc<MockChain>,
        custodian: Arc<GasCustodian>,
        master: Address,
    }

    async fn fixture(master_balance: u64) -> Fixture {
        let chain = Arc::new(MockChain::new());
        let master = DerivedKeySigner::from_master(&master_secret()).unwrap();
        let custodian = Arc::new(GasCustodian::new(chain.clone(), master, test_policy()));
        let master = custodian.master_address().await.unwrap();
        chain.set_balance(master, wei(master_balance));
        Fixture {
            chain,
            custodian,
            master,
        }
    }

    async fn tenant(fixture: &Fixture, raw: &str, balance: u64) -> (DerivedKeySigner, Address) {
        let id = TenantId::parse(raw).unwrap();
        let signer = DerivedKeySigner::from_key_material(&derive(&master_secret(), &id))
            .unwrap()
            .connect(fixture.chain.clone());
        let address = signer.address().await.unwrap();
        fixture.chain.set_balance(address, wei(balance));
        (signer, address)
    }

    #[tokio::test]
    async fn balance_at_threshold_needs_no_transfer() {
        let fx = fixture(100_000).await;
        let (signer, address) = tenant(&fx, "+1555", 1_000).await;

        let outcome = fx.custodian.ensure_gas_balance(&signer).await.unwrap();
        assert_eq!(
            outcome,
            GasOutcome::Sufficient {
                address,
                balance: wei(1_000)
            }
        );
        assert!(fx.chain.transfers().is_empty());
    }

    #[tokio::test]
    async fn balance_below_threshold_gets_one_top_up() {
        let fx = fixture(100_000).await;
        let (signer, address) = tenant(&fx, "+1555", 999).await;

        let outcome = fx.custodian.ensure_gas_balance(&signer).await.unwrap();
        assert!(outcome.topped_up());
        assert_eq!(outcome.address(), address);

        let transfers = fx.chain.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].to, address);
        assert_eq!(transfers[0].value, wei(5_000));
        assert_eq!(fx.chain.balance_of(address), wei(5_999));
        assert_eq!(
            fx.chain.balance_of(fx.master),
            wei(100_000 - 5_000 - TRANSFER_FEE)
        );
    }

    #[tokio::test]
    async fn master_must_cover_amount_and_fee() {
        let fx = fixture(5_000).await;
        let (signer, _) = tenant(&fx, "+1555", 0).await;

        let err = fx.custodian.ensure_gas_balance(&signer).await.unwrap_err();
        assert!(matches!(
            err,
            GasError::InsufficientMasterFunds { required, available }
                if required == wei(5_000 + TRANSFER_FEE) && available == wei(5_000)
        ));
        assert!(!err.is_retryable());
        assert!(fx.chain.transfers().is_empty());
    }

    #[tokio::test]
    async fn master_funded_for_one_top_up_serves_one_tenant() {
        let fx = fixture(5_000 + TRANSFER_FEE).await;
        fx.chain.set_send_delay(Duration::from_millis(20));
        let (a, _) = tenant(&fx, "+1555000001", 0).await;
        let (b, _) = tenant(&fx, "+1555000002", 0).await;

        let (ra, rb) = tokio::join!(
            fx.custodian.ensure_gas_balance(&a),
            fx.custodian.ensure_gas_balance(&b)
        );
        let results = [ra, rb];
        let topped_up = results
            .iter()
            .filter(|r| r.as_ref().is_ok_and(GasOutcome::topped_up))
            .count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(GasError::InsufficientMasterFunds { .. })))
            .count();

        assert_eq!(topped_up, 1);
        assert_eq!(insufficient, 1);
        assert_eq!(fx.chain.transfers().len(), 1);
        assert_eq!(fx.chain.transfers()[0].from, fx.master);
        assert_eq!(fx.chain.balance_of(fx.master), U256::ZERO);
    }

    #[tokio::test]
    async fn concurrent_calls_for_one_tenant_transfer_once() {
        let fx = fixture(100_000).await;
        fx.chain.set_send_delay(Duration::from_millis(20));
        let (signer, address) = tenant(&fx, "+1555", 0).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let custodian = Arc::clone(&fx.custodian);
            let signer = signer.clone();
            handles.push(tokio::spawn(async move {
                custodian.ensure_gas_balance(&signer).await
            }));
        }

        let mut topped_up = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().topped_up() {
                topped_up += 1;
            }
        }
        assert_eq!(topped_up, 1);
        assert_eq!(fx.chain.transfers().len(), 1);
        assert_eq!(fx.chain.transfers()[0].to, address);
        assert_eq!(fx.custodian.tenant_locks.tracked(), 0);
    }

    #[tokio::test]
    async fn different_tenants_are_each_funded() {
        let fx = fixture(100_000).await;
        let (a, _) = tenant(&fx, "+1555000001", 0).await;
        let (b, _) = tenant(&fx, "+1555000002", 0).await;

        let (ra, rb) = tokio::join!(
            fx.custodian.ensure_gas_balance(&a),
            fx.custodian.ensure_gas_balance(&b)
        );
        assert!(ra.unwrap().topped_up());
        assert!(rb.unwrap().topped_up());
        assert_eq!(fx.chain.transfers().len(), 2);
    }

    #[tokio::test]
    async fn confirmation_timeout_is_distinct() {
        let fx = fixture(100_000).await;
        fx.chain.never_confirm();
        let (signer, _) = tenant(&fx, "+1555", 0).await;

        let err = fx.custodian.ensure_gas_balance(&signer).await.unwrap_err();
        let broadcast = fx.chain.transfers()[0].tx_hash;
        assert!(matches!(err, GasError::ConfirmationTimeout { tx_hash } if tx_hash == broadcast));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn failed_broadcast_is_top_up_failure() {
        let fx = fixture(100_000).await;
        fx.chain.fail_sends();
        let (signer, _) = tenant(&fx, "+1555", 0).await;

        let err = fx.custodian.ensure_gas_balance(&signer).await.unwrap_err();
        assert!(matches!(err, GasError::TopUpFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn reverted_top_up_is_failure() {
        let fx = fixture(100_000).await;
        fx.chain.revert_transactions();
        let (signer, _) = tenant(&fx, "+1555", 0).await;

        let err = fx.custodian.ensure_gas_balance(&signer).await.unwrap_err();
        assert!(matches!(err, GasError::TopUpFailed(_)));
    }

    #[tokio::test]
    async fn master_health_flags_low_balance() {
        let fx = fixture(49_999).await;
        assert!(fx.custodian.last_master_health().is_none());
        let health = fx.custodian.check_master_health().await.unwrap();
        assert_eq!(health.address, fx.master);
        assert!(health.below_alert_threshold);
        assert_eq!(fx.custodian.last_master_health(), Some(health));

        fx.chain.set_balance(fx.master, wei(50_000));
        let health = fx.custodian.check_master_health().await.unwrap();
        assert!(!health.below_alert_threshold);
        assert!(fx.chain.transfers().is_empty());
    }
}
