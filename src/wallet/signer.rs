// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Adapter
//!
//! [`TenantSigner`] is the capability contract handed to exchange clients and
//! the gas custodian. [`DerivedKeySigner`] implements it over a tenant's
//! derived key.
//!
//! ## Address resolution
//!
//! The address is resolved once through an async `OnceCell` shared by every
//! clone of the signer. All signing operations await it first, so no caller
//! can observe a half-initialized signer.
//!
//! ## Provider binding
//!
//! [`TenantSigner::connect`] returns a new signer sharing the same key core;
//! the original keeps its own provider (or none).

use std::fmt;
use std::sync::Arc;

use alloy::{
    eips::eip2718::Encodable2718,
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, Signature, TxHash, B256},
    rpc::types::TransactionRequest,
    signers::{local::PrivateKeySigner, Signer},
};
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::blockchain::{ChainError, ChainProvider};

use super::kdf::{DerivedKeyMaterial, MasterSecret};

/// Capability contract every signer backend provides.
#[async_trait]
pub trait TenantSigner: Send + Sync {
    /// Account address controlled by this signer.
    async fn address(&self) -> Result<Address, SignerError>;

    /// EIP-191 personal-message signature.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Signature over a precomputed 32-byte digest (EIP-712 payloads).
    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SignerError>;

    /// Sign a fully populated transaction and return its EIP-2718 encoding.
    ///
    /// Backends that can only sign and submit atomically keep this default.
    async fn sign_transaction(&self, _tx: TransactionRequest) -> Result<Bytes, SignerError> {
        Err(SignerError::UnsupportedOperation("sign_transaction"))
    }

    /// Fill, sign and broadcast a transaction through the bound provider.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, SignerError>;

    /// Provider this signer is bound to, if any.
    fn provider(&self) -> Option<&Arc<dyn ChainProvider>>;

    /// Same key, bound to `provider`.
    fn connect(&self, provider: Arc<dyn ChainProvider>) -> Self
    where
        Self: Sized;
}

struct KeyCore {
    key: PrivateKeySigner,
    address: OnceCell<Address>,
}

/// Signer backed by locally held derived key material.
#[derive(Clone)]
pub struct DerivedKeySigner {
    core: Arc<KeyCore>,
    provider: Option<Arc<dyn ChainProvider>>,
}

impl DerivedKeySigner {
    /// Build an unbound signer from tenant key material.
    pub fn from_key_material(material: &DerivedKeyMaterial) -> Result<Self, SignerError> {
        Self::from_bytes(material.as_bytes())
    }

    /// Build an unbound signer for the master (funding) account.
    pub fn from_master(master: &MasterSecret) -> Result<Self, SignerError> {
        Self::from_bytes(master.as_bytes())
    }

    fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignerError> {
        let key = PrivateKeySigner::from_slice(bytes)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self {
            core: Arc::new(KeyCore {
                key,
                address: OnceCell::new(),
            }),
            provider: None,
        })
    }

    /// Whether two handles share the same key core.
    pub fn shares_key_with(&self, other: &DerivedKeySigner) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    fn require_provider(&self) -> Result<&Arc<dyn ChainProvider>, SignerError> {
        self.provider.as_ref().ok_or(SignerError::MissingProvider)
    }

    /// Fill nonce, gas price, gas limit and chain id from the provider.
    async fn populate(
        &self,
        provider: &Arc<dyn ChainProvider>,
        from: Address,
        mut tx: TransactionRequest,
    ) -> Result<TransactionRequest, SignerError> {
        tx.from = Some(from);
        if tx.chain_id.is_none() {
            tx.chain_id = Some(provider.chain_id().await?);
        }
        if tx.nonce.is_none() {
            tx.nonce = Some(provider.get_transaction_count(from).await?);
        }
        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            tx.gas_price = Some(provider.get_gas_price().await?);
        }
        if tx.gas.is_none() {
            tx.gas = Some(provider.estimate_gas(&tx).await?);
        }
        Ok(tx)
    }
}

impl fmt::Debug for DerivedKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeySigner")
            .field("address", &self.core.address.get())
            .field("bound", &self.provider.is_some())
            .finish()
    }
}

#[async_trait]
impl TenantSigner for DerivedKeySigner {
    async fn address(&self) -> Result<Address, SignerError> {
        let address = self
            .core
            .address
            .get_or_init(|| async { self.core.key.address() })
            .await;
        Ok(*address)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        self.address().await?;
        self.core
            .key
            .sign_message(message)
            .await
            .map_err(|e| SignerError::SigningFailure(e.to_string()))
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, SignerError> {
        self.address().await?;
        self.core
            .key
            .sign_hash(hash)
            .await
            .map_err(|e| SignerError::SigningFailure(e.to_string()))
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes, SignerError> {
        let mut tx = tx;
        tx.from = Some(self.address().await?);
        let wallet = EthereumWallet::from(self.core.key.clone());
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &wallet)
            .await
            .map_err(|e| SignerError::SigningFailure(e.to_string()))?;
        Ok(envelope.encoded_2718().into())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, SignerError> {
        let provider = self.require_provider()?;
        let from = self.address().await?;
        let tx = self.populate(provider, from, tx).await?;
        let raw = self.sign_transaction(tx).await?;
        let tx_hash = provider.send_raw_transaction(&raw).await?;
        tracing::debug!(from = %from, tx_hash = %tx_hash, "Transaction broadcast");
        Ok(tx_hash)
    }

    fn provider(&self) -> Option<&Arc<dyn ChainProvider>> {
        self.provider.as_ref()
    }

    fn connect(&self, provider: Arc<dyn ChainProvider>) -> Self {
        Self {
            core: Arc::clone(&self.core),
            provider: Some(provider),
        }
    }
}

/// Errors raised by signer backends.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Operation `{0}` is not supported by this signer")]
    UnsupportedOperation(&'static str),

    #[error("No network provider is bound to this signer")]
    MissingProvider,

    #[error(transparent)]
    Provider(#[from] ChainError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{master_secret, MockChain};
    use crate::wallet::kdf::{derive, TenantId};
    use alloy::primitives::U256;

    fn tenant_signer(raw: &str) -> DerivedKeySigner {
        let tenant = TenantId::parse(raw).unwrap();
        DerivedKeySigner::from_key_material(&derive(&master_secret(), &tenant)).unwrap()
    }

    /// Backend that can only sign-and-send, used to exercise the default.
    struct SubmitOnlySigner;

    #[async_trait]
    impl TenantSigner for SubmitOnlySigner {
        async fn address(&self) -> Result<Address, SignerError> {
            Ok(Address::ZERO)
        }
        async fn sign_message(&self, _message: &[u8]) -> Result<Signature, SignerError> {
            Err(SignerError::UnsupportedOperation("sign_message"))
        }
        async fn sign_hash(&self, _hash: &B256) -> Result<Signature, SignerError> {
            Err(SignerError::UnsupportedOperation("sign_hash"))
        }
        async fn send_transaction(&self, _tx: TransactionRequest) -> Result<TxHash, SignerError> {
            Err(SignerError::MissingProvider)
        }
        fn provider(&self) -> Option<&Arc<dyn ChainProvider>> {
            None
        }
        fn connect(&self, _provider: Arc<dyn ChainProvider>) -> Self {
            SubmitOnlySigner
        }
    }

    #[tokio::test]
    async fn address_is_memoized_across_clones() {
        let signer = tenant_signer("+15550000001");
        let clone = signer.clone();
        assert!(signer.core.address.get().is_none());

        let (a, b) = tokio::join!(signer.address(), clone.address());
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(clone.core.address.get(), Some(&a));
    }

    #[tokio::test]
    async fn message_signature_recovers_to_address() {
        let signer = tenant_signer("+15550000002");
        let message = b"order:123";
        let signature = signer.sign_message(message).await.unwrap();
        let recovered = signature.recover_address_from_msg(&message[..]).unwrap();
        assert_eq!(recovered, signer.address().await.unwrap());
    }

    #[tokio::test]
    async fn send_without_provider_fails() {
        let signer = tenant_signer("+15550000003");
        let tx = TransactionRequest::default().to(Address::repeat_byte(1));
        let err = signer.send_transaction(tx).await.unwrap_err();
        assert!(matches!(err, SignerError::MissingProvider));
    }

    #[tokio::test]
    async fn default_sign_transaction_is_unsupported() {
        let err = SubmitOnlySigner
            .sign_transaction(TransactionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedOperation("sign_transaction")));
    }

    #[tokio::test]
    async fn incomplete_transaction_fails_to_sign() {
        let signer = tenant_signer("+15550000004");
        let tx = TransactionRequest::default().to(Address::repeat_byte(1));
        let err = signer.sign_transaction(tx).await.unwrap_err();
        assert!(matches!(err, SignerError::SigningFailure(_)));
    }

    #[tokio::test]
    async fn connect_shares_key_and_leaves_original_unbound() {
        let chain = Arc::new(MockChain::new());
        let signer = tenant_signer("+15550000005");
        let bound = signer.connect(chain.clone());

        assert!(signer.provider().is_none());
        assert!(bound.provider().is_some());
        assert!(bound.shares_key_with(&signer));
        assert_eq!(bound.address().await.unwrap(), signer.address().await.unwrap());
    }

    #[tokio::test]
    async fn send_transaction_fills_and_broadcasts() {
        let chain = Arc::new(MockChain::new());
        let signer = tenant_signer("+15550000006").connect(chain.clone());
        let from = signer.address().await.unwrap();
        chain.set_balance(from, U256::from(1_000_000u64));
        let to = Address::repeat_byte(0x22);

        let tx_hash = signer
            .send_transaction(TransactionRequest::default().to(to).value(U256::from(5u64)))
            .await
            .unwrap();

        let transfers = chain.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].to, to);
        assert_eq!(transfers[0].value, U256::from(5u64));
        assert_eq!(transfers[0].tx_hash, tx_hash);
        assert_eq!(transfers[0].from, from);
        assert!(chain.balance_of(from) < U256::from(1_000_000u64 - 5));
    }
}
