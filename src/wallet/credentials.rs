// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Exchange Credential Derivation
//!
//! Each tenant's exchange API credential is derived remotely by proving
//! control of the tenant signer (level-1 auth: an EIP-712 `ClobAuth`
//! signature). The exchange returns the same triple for the same signer, so
//! the local cache only saves round-trips.
//!
//! Responses are normalized before caching: the key may arrive as `apiKey` or
//! `key`, and the secret in any base64 dialect. Cached credentials always carry
//! the standard padded encoding.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::{
    primitives::{Address, B256, U256},
    sol,
    sol_types::{eip712_domain, SolStruct},
};
use async_trait::async_trait;
use base64ct::{Base64, Base64Unpadded, Base64Url, Base64UrlUnpadded, Encoding};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{info, warn};

use super::cache::TenantCache;
use super::kdf::TenantId;
use super::signer::TenantSigner;

/// Fixed attestation text signed for level-1 auth.
pub const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_AUTH_DOMAIN_VERSION: &str = "1";

sol! {
    struct ClobAuth {
        address address;
        string timestamp;
        uint256 nonce;
        string message;
    }
}

/// EIP-712 signing hash of a `ClobAuth` attestation.
pub fn clob_auth_digest(address: Address, timestamp: &str, nonce: u64, chain_id: u64) -> B256 {
    let domain = eip712_domain! {
        name: CLOB_AUTH_DOMAIN_NAME,
        version: CLOB_AUTH_DOMAIN_VERSION,
        chain_id: chain_id,
    };
    let auth = ClobAuth {
        address,
        timestamp: timestamp.to_string(),
        nonce: U256::from(nonce),
        message: CLOB_AUTH_MESSAGE.to_string(),
    };
    auth.eip712_signing_hash(&domain)
}

/// Exchange API credential triple.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    pub key: String,
    /// Standard padded base64.
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid credential shape: {0}")]
    InvalidShape(String),

    #[error("Could not sign the auth attestation: {0}")]
    Signing(String),

    #[error("Credential request failed: {0}")]
    Transport(String),

    #[error("Exchange returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

impl CredentialError {
    pub fn is_transient(&self) -> bool {
        match self {
            CredentialError::Transport(_) => true,
            CredentialError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn required_field<'a>(raw: &'a Value, names: &[&str]) -> Result<&'a str, CredentialError> {
    names
        .iter()
        .filter_map(|name| raw.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .ok_or_else(|| {
            CredentialError::InvalidShape(format!("missing or empty field `{}`", names[0]))
        })
}

fn canonical_secret(secret: &str) -> Result<String, CredentialError> {
    let bytes = Base64::decode_vec(secret)
        .or_else(|_| Base64Unpadded::decode_vec(secret))
        .or_else(|_| Base64Url::decode_vec(secret))
        .or_else(|_| Base64UrlUnpadded::decode_vec(secret))
        .map_err(|_| CredentialError::InvalidShape("secret is not base64".to_string()))?;
    if bytes.is_empty() {
        return Err(CredentialError::InvalidShape("secret is empty".to_string()));
    }
    Ok(Base64::encode_string(&bytes))
}

/// Map any accepted response shape onto [`ApiCredential`].
pub fn normalize_credential(raw: &Value) -> Result<ApiCredential, CredentialError> {
    if !raw.is_object() {
        return Err(CredentialError::InvalidShape(
            "response is not a JSON object".to_string(),
        ));
    }
    let key = required_field(raw, &["apiKey", "key"])?;
    let secret = required_field(raw, &["secret"])?;
    let passphrase = required_field(raw, &["passphrase"])?;

    Ok(ApiCredential {
        key: key.to_string(),
        secret: canonical_secret(secret)?,
        passphrase: passphrase.to_string(),
    })
}

/// Remote "derive or create API key" operation.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Raw response body, authenticated as `signer`.
    async fn derive_or_create(&self, signer: &dyn TenantSigner) -> Result<Value, CredentialError>;
}

/// Level-1 authenticated client for the exchange's API key endpoints.
pub struct ClobCredentialClient {
    host: String,
    chain_id: u64,
    http: Client,
}

impl ClobCredentialClient {
    pub fn new(host: &str, chain_id: u64, timeout: Duration) -> Result<Self, CredentialError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            chain_id,
            http,
        })
    }

    async fn with_l1_headers(
        &self,
        request: RequestBuilder,
        signer: &dyn TenantSigner,
    ) -> Result<RequestBuilder, CredentialError> {
        let address = signer
            .address()
            .await
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let nonce = 0u64;
        let digest = clob_auth_digest(address, &timestamp, nonce, self.chain_id);
        let signature = signer
            .sign_hash(&digest)
            .await
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(request
            .header("POLY_ADDRESS", address.to_string())
            .header("POLY_SIGNATURE", alloy::primitives::hex::encode_prefixed(signature.as_bytes()))
            .header("POLY_TIMESTAMP", timestamp)
            .header("POLY_NONCE", nonce.to_string()))
    }

    async fn call(&self, request: RequestBuilder) -> Result<Value, CredentialError> {
        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Upstream { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidShape(format!("response is not JSON: {e}")))
    }
}

#[async_trait]
impl CredentialSource for ClobCredentialClient {
    async fn derive_or_create(&self, signer: &dyn TenantSigner) -> Result<Value, CredentialError> {
        let derive = self
            .with_l1_headers(
                self.http.get(format!("{}/auth/derive-api-key", self.host)),
                signer,
            )
            .await?;
        match self.call(derive).await {
            Ok(body) => Ok(body),
            Err(e) => {
                warn!(error = %e, "Derive API key failed, creating a new key");
                let create = self
                    .with_l1_headers(self.http.post(format!("{}/auth/api-key", self.host)), signer)
                    .await?;
                self.call(create).await
            }
        }
    }
}

/// Per-tenant credential cache in front of a [`CredentialSource`].
pub struct CredentialManager {
    source: Arc<dyn CredentialSource>,
    credentials: TenantCache<ApiCredential>,
}

impl CredentialManager {
    pub fn new(source: Arc<dyn CredentialSource>, capacity: usize) -> Self {
        Self {
            source,
            credentials: TenantCache::new(capacity),
        }
    }

    /// Cached credential for `tenant`, derived remotely on first use.
    ///
    /// A failure leaves the tenant's slot empty. Callers already waiting on
    /// it retry in turn, so at most one remote derivation runs per tenant.
    pub async fn get_credentials(
        &self,
        tenant: &TenantId,
        signer: &dyn TenantSigner,
    ) -> Result<ApiCredential, CredentialError> {
        let result: Result<ApiCredential, CredentialError> = self
            .credentials
            .get_or_try_init(tenant, || async {
                let raw = self.source.derive_or_create(signer).await?;
                let credential = normalize_credential(&raw)?;
                if let Ok(address) = signer.address().await {
                    info!(address = %address, "Derived exchange credentials");
                }
                Ok(credential)
            })
            .await;

        if let Err(e) = &result {
            match signer.address().await {
                Ok(address) => warn!(address = %address, error = %e, "Credential derivation failed"),
                Err(_) => warn!(error = %e, "Credential derivation failed"),
            }
        }
        result
    }

    pub fn invalidate(&self, tenant: &TenantId) -> bool {
        self.credentials.invalidate(tenant)
    }
}
