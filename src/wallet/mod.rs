// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multi-tenant wallet core.
//!
//! This module provides:
//! - Deterministic per-tenant key derivation from one master secret
//! - A signer contract exchange clients can be handed
//! - Per-tenant signer and credential caches
//! - Gas custody: automatic top-ups from the master account

pub mod cache;
pub mod credentials;
pub mod error;
pub mod gas;
pub mod kdf;
pub mod monitor;
pub mod registry;
pub mod service;
pub mod signer;

pub use cache::{TenantCache, DEFAULT_TENANT_CAPACITY};
pub use credentials::{
    normalize_credential, ApiCredential, ClobCredentialClient, CredentialError,
    CredentialManager, CredentialSource,
};
pub use error::{Stage, WalletError};
pub use gas::{GasCustodian, GasError, GasOutcome, GasPolicy, MasterHealth};
pub use kdf::{derive, DerivedKeyMaterial, MasterSecret, TenantId};
pub use monitor::{HealthMonitor, DEFAULT_HEALTH_CHECK_INTERVAL};
pub use registry::SignerRegistry;
pub use service::{TenantSession, WalletService};
pub use signer::{DerivedKeySigner, SignerError, TenantSigner};
