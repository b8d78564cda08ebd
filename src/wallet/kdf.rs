// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Tenant Key Derivation
//!
//! Every tenant key is computed from the process-wide [`MasterSecret`] and the
//! tenant identifier; nothing is stored.
//!
//! ## Construction
//!
//! ```text
//! key = HMAC-SHA256(master_secret,
//!                   "polyproxy/tenant-key/v1" || 0x00 || tenant_id || 0x00 || counter_be32)
//! ```
//!
//! `counter` starts at 0 and is only incremented when the output is not a
//! valid secp256k1 scalar (zero or not below the curve order), which happens
//! with probability around 2^-128.
//!
//! ## Trust model
//!
//! HMAC is a PRF: a leaked tenant key reveals neither the master secret nor
//! any sibling key. The master secret is the single root of trust; whoever
//! holds it can recompute every tenant key. Changing the domain tag or the
//! encoding changes every derived address.

use std::fmt;

use hmac::{Hmac, Mac};
use k256::SecretKey;
use sha2::Sha256;

use crate::config::ConfigError;

use super::error::WalletError;

type HmacSha256 = Hmac<Sha256>;

/// Domain separation tag for tenant key derivation.
const DERIVATION_DOMAIN: &[u8] = b"polyproxy/tenant-key/v1";

/// Upper bound on tenant identifier length in bytes.
pub const MAX_TENANT_ID_LEN: usize = 128;

/// Root secret all tenant keys are derived from.
///
/// Also the private key of the master (funding) account.
#[derive(Clone)]
pub struct MasterSecret([u8; 32]);

impl MasterSecret {
    /// Parse a hex-encoded secp256k1 private key (optional `0x` prefix).
    pub fn from_hex(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            var: crate::config::MASTER_PRIVATE_KEY_ENV,
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes =
            alloy::primitives::hex::decode(hex_part).map_err(|_| invalid("not a hex string"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| invalid("expected 32 bytes"))?;

        if SecretKey::from_slice(&bytes).is_err() {
            return Err(invalid("not a valid secp256k1 private key"));
        }

        Ok(Self(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

/// Opaque tenant identifier (a phone number in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Validate untrusted input: trimmed, non-empty, bounded length.
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidTenant(
                "tenant id must not be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_TENANT_ID_LEN {
            return Err(WalletError::InvalidTenant(format!(
                "tenant id exceeds {MAX_TENANT_ID_LEN} bytes"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 32-byte private key material for one tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKeyMaterial([u8; 32]);

impl DerivedKeyMaterial {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKeyMaterial(<redacted>)")
    }
}

/// Derive the signing key material for `tenant`.
pub fn derive(master: &MasterSecret, tenant: &TenantId) -> DerivedKeyMaterial {
    let mut counter: u32 = 0;
    loop {
        let mut mac = HmacSha256::new_from_slice(master.as_bytes())
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(DERIVATION_DOMAIN);
        mac.update(&[0]);
        mac.update(tenant.as_str().as_bytes());
        mac.update(&[0]);
        mac.update(&counter.to_be_bytes());

        let mut candidate = [0u8; 32];
        candidate.copy_from_slice(&mac.finalize().into_bytes());

        if SecretKey::from_slice(&candidate).is_ok() {
            return DerivedKeyMaterial(candidate);
        }
        counter = counter.wrapping_add(1);
    }
}
