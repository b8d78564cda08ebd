// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-tenant signer registry.
//!
//! Derivation and construction run at most once per cached tenant; the
//! returned signer is already bound to the network provider and has its
//! address resolved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use tracing::debug;

use crate::blockchain::ChainProvider;

use super::cache::TenantCache;
use super::kdf::{derive, MasterSecret, TenantId};
use super::signer::{DerivedKeySigner, SignerError, TenantSigner};

pub struct SignerRegistry {
    master: MasterSecret,
    signers: TenantCache<DerivedKeySigner>,
    provider: Option<Arc<dyn ChainProvider>>,
    derivations: AtomicU64,
}

impl SignerRegistry {
    pub fn new(
        master: MasterSecret,
        provider: Option<Arc<dyn ChainProvider>>,
        capacity: usize,
    ) -> Self {
        Self {
            master,
            signers: TenantCache::new(capacity),
            provider,
            derivations: AtomicU64::new(0),
        }
    }

    /// Signer for `tenant`, derived on first use.
    pub async fn get_signer(&self, tenant: &TenantId) -> Result<DerivedKeySigner, SignerError> {
        self.signers
            .get_or_try_init(tenant, || async {
                self.derivations.fetch_add(1, Ordering::Relaxed);
                let material = derive(&self.master, tenant);
                let signer = DerivedKeySigner::from_key_material(&material)?;
                let signer = match &self.provider {
                    Some(provider) => signer.connect(Arc::clone(provider)),
                    None => signer,
                };
                let address = signer.address().await?;
                debug!(address = %address, "Derived tenant signer");
                Ok(signer)
            })
            .await
    }

    /// Signer for the master (funding) account, bound like tenant signers.
    pub fn master_signer(&self) -> Result<DerivedKeySigner, SignerError> {
        let signer = DerivedKeySigner::from_master(&self.master)?;
        Ok(match &self.provider {
            Some(provider) => signer.connect(Arc::clone(provider)),
            None => signer,
        })
    }

    pub async fn master_address(&self) -> Result<Address, SignerError> {
        self.master_signer()?.address().await
    }

    /// Total derivations performed since startup.
    pub fn derivation_count(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn cached_tenants(&self) -> usize {
        self.signers.len()
    }
}
