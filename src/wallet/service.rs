// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet service facade.
//!
//! One instance owns the signer registry, the credential cache and the gas
//! custodian, and is shared by reference with every caller. All entry points
//! take the raw tenant id and validate it first.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::blockchain::{
    format_amount, ChainProvider, NetworkConfig, RpcProvider, TokenBalance,
    WalletBalanceResponse, COLLATERAL_DECIMALS, NATIVE_DECIMALS,
};
use crate::config::Settings;

use super::credentials::{ApiCredential, ClobCredentialClient, CredentialManager, CredentialSource};
use super::error::WalletError;
use super::gas::{GasCustodian, GasOutcome, GasPolicy, MasterHealth};
use super::kdf::{MasterSecret, TenantId};
use super::registry::SignerRegistry;
use super::signer::{DerivedKeySigner, TenantSigner};

/// What an exchange client needs to act for one tenant.
#[derive(Debug, Clone)]
pub struct TenantSession {
    pub signer: DerivedKeySigner,
    pub credentials: ApiCredential,
    /// Set when the session was prepared for a transaction.
    pub gas: Option<GasOutcome>,
}

pub struct WalletService {
    network: NetworkConfig,
    collateral_token: Address,
    provider: Arc<dyn ChainProvider>,
    signers: SignerRegistry,
    credentials: CredentialManager,
    custodian: Arc<GasCustodian>,
}

impl WalletService {
    /// Production wiring: alloy RPC provider and the exchange credential client.
    pub fn from_settings(settings: &Settings) -> Result<Self, WalletError> {
        let network = NetworkConfig::for_chain_id(settings.chain_id);
        let provider = RpcProvider::new(
            network.clone(),
            &settings.rpc_url,
            settings.gas_policy.rpc_timeout,
        )?;
        let credentials = ClobCredentialClient::new(
            &settings.clob_host,
            settings.chain_id,
            settings.gas_policy.rpc_timeout,
        )?;

        Self::from_parts(
            settings.master_secret.clone(),
            Arc::new(provider),
            Arc::new(credentials),
            settings.gas_policy.clone(),
            settings.tenant_cache_capacity,
            network,
            settings.collateral_token,
        )
    }

    pub fn from_parts(
        master: MasterSecret,
        provider: Arc<dyn ChainProvider>,
        credential_source: Arc<dyn CredentialSource>,
        policy: GasPolicy,
        cache_capacity: usize,
        network: NetworkConfig,
        collateral_token: Address,
    ) -> Result<Self, WalletError> {
        let signers = SignerRegistry::new(master, Some(Arc::clone(&provider)), cache_capacity);
        let custodian = GasCustodian::new(Arc::clone(&provider), signers.master_signer()?, policy);

        Ok(Self {
            network,
            collateral_token,
            provider,
            signers,
            credentials: CredentialManager::new(credential_source, cache_capacity),
            custodian: Arc::new(custodian),
        })
    }

    pub async fn get_signer(&self, tenant_id: &str) -> Result<DerivedKeySigner, WalletError> {
        let tenant = TenantId::parse(tenant_id)?;
        Ok(self.signers.get_signer(&tenant).await?)
    }

    pub async fn get_credentials(&self, tenant_id: &str) -> Result<ApiCredential, WalletError> {
        let tenant = TenantId::parse(tenant_id)?;
        let signer = self.signers.get_signer(&tenant).await?;
        Ok(self.credentials.get_credentials(&tenant, &signer).await?)
    }

    pub async fn ensure_gas_balance(&self, tenant_id: &str) -> Result<GasOutcome, WalletError> {
        let signer = self.get_signer(tenant_id).await?;
        Ok(self.custodian.ensure_gas_balance(&signer).await?)
    }

    pub async fn check_master_health(&self) -> Result<MasterHealth, WalletError> {
        Ok(self.custodian.check_master_health().await?)
    }

    /// Latest master snapshot taken by a health check; no RPC call.
    pub fn last_master_health(&self) -> Option<MasterHealth> {
        self.custodian.last_master_health()
    }

    /// Signer and credentials for read-only exchange calls; gas is untouched.
    pub async fn session(&self, tenant_id: &str) -> Result<TenantSession, WalletError> {
        let tenant = TenantId::parse(tenant_id)?;
        let signer = self.signers.get_signer(&tenant).await?;
        let credentials = self.credentials.get_credentials(&tenant, &signer).await?;
        Ok(TenantSession {
            signer,
            credentials,
            gas: None,
        })
    }

    /// Fund the tenant if needed, then build its session.
    ///
    /// Fails before any credential call when funding fails.
    pub async fn prepare_for_transaction(
        &self,
        tenant_id: &str,
    ) -> Result<TenantSession, WalletError> {
        let tenant = TenantId::parse(tenant_id)?;
        let signer = self.signers.get_signer(&tenant).await?;
        let gas = self.custodian.ensure_gas_balance(&signer).await?;
        let credentials = self.credentials.get_credentials(&tenant, &signer).await?;
        Ok(TenantSession {
            signer,
            credentials,
            gas: Some(gas),
        })
    }

    /// Native and collateral balances of the tenant's account.
    ///
    /// A failed collateral read is logged and left out of the response.
    pub async fn balances(&self, tenant_id: &str) -> Result<WalletBalanceResponse, WalletError> {
        let address = self.get_signer(tenant_id).await?.address().await?;
        let native = self.provider.get_balance(address).await?;

        let collateral_balance = match self
            .provider
            .token_balance(self.collateral_token, address)
            .await
        {
            Ok(raw) => Some(TokenBalance {
                symbol: "USDC.e".to_string(),
                balance_raw: raw.to_string(),
                balance_formatted: format_amount(raw, COLLATERAL_DECIMALS),
                decimals: COLLATERAL_DECIMALS,
                contract_address: Some(self.collateral_token.to_string()),
            }),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Collateral balance read failed");
                None
            }
        };

        Ok(WalletBalanceResponse {
            address: address.to_string(),
            network: self.network.name.to_string(),
            chain_id: self.network.chain_id,
            native_balance: TokenBalance {
                symbol: self.network.native_symbol.to_string(),
                balance_raw: native.to_string(),
                balance_formatted: format_amount(native, NATIVE_DECIMALS),
                decimals: NATIVE_DECIMALS,
                contract_address: None,
            },
            collateral_balance,
        })
    }

    pub fn custodian(&self) -> Arc<GasCustodian> {
        Arc::clone(&self.custodian)
    }

    pub fn provider(&self) -> &Arc<dyn ChainProvider> {
        &self.provider
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub async fn master_address(&self) -> Result<Address, WalletError> {
        Ok(self.signers.master_address().await?)
    }

    pub fn derivation_count(&self) -> u64 {
        self.signers.derivation_count()
    }

    pub fn cached_tenants(&self) -> usize {
        self.signers.cached_tenants()
    }
}
