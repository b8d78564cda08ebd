// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt;

use crate::blockchain::ChainError;
use crate::config::ConfigError;

use super::credentials::CredentialError;
use super::gas::GasError;
use super::signer::SignerError;

/// Stage of the tenant pipeline a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Derivation,
    Signing,
    Credentialing,
    Funding,
    Configuration,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Derivation => "derivation",
            Stage::Signing => "signing",
            Stage::Credentialing => "credentialing",
            Stage::Funding => "funding",
            Stage::Configuration => "configuration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure of a wallet service operation.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid tenant id: {0}")]
    InvalidTenant(String),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Gas(#[from] GasError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl WalletError {
    pub fn stage(&self) -> Stage {
        match self {
            WalletError::InvalidTenant(_) | WalletError::Signer(SignerError::InvalidKey(_)) => {
                Stage::Derivation
            }
            WalletError::Signer(_) | WalletError::Gas(GasError::Signer(_)) => Stage::Signing,
            WalletError::Credential(_) => Stage::Credentialing,
            WalletError::Gas(_) | WalletError::Chain(_) => Stage::Funding,
            WalletError::Configuration(_) => Stage::Configuration,
        }
    }

    /// Whether an automated caller may retry, as opposed to needing a fix
    /// to its input or operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            WalletError::Signer(SignerError::Provider(e)) | WalletError::Chain(e) => {
                e.is_transient()
            }
            WalletError::Credential(CredentialError::InvalidShape(_)) => true,
            WalletError::Credential(e) => e.is_transient(),
            WalletError::Gas(e) => e.is_retryable(),
            WalletError::InvalidTenant(_)
            | WalletError::Signer(_)
            | WalletError::Configuration(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{TxHash, U256};

    use super::*;

    #[test]
    fn stages_follow_the_failing_layer() {
        assert_eq!(
            WalletError::InvalidTenant("empty".into()).stage(),
            Stage::Derivation
        );
        assert_eq!(
            WalletError::from(SignerError::MissingProvider).stage(),
            Stage::Signing
        );
        assert_eq!(
            WalletError::from(CredentialError::InvalidShape("x".into())).stage(),
            Stage::Credentialing
        );
        assert_eq!(
            WalletError::from(GasError::TopUpFailed("x".into())).stage(),
            Stage::Funding
        );
        assert_eq!(
            WalletError::from(ConfigError::Missing("MASTER_PRIVATE_KEY")).stage(),
            Stage::Configuration
        );
    }

    #[test]
    fn operator_conditions_are_not_retryable() {
        let insufficient = WalletError::from(GasError::InsufficientMasterFunds {
            required: U256::from(10u64),
            available: U256::ZERO,
        });
        let unconfirmed = WalletError::from(GasError::ConfirmationTimeout {
            tx_hash: TxHash::ZERO,
        });
        assert!(!insufficient.is_retryable());
        assert!(!unconfirmed.is_retryable());
        assert!(!WalletError::from(SignerError::UnsupportedOperation("sign_transaction")).is_retryable());
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(WalletError::from(GasError::TopUpFailed("nonce too low".into())).is_retryable());
        assert!(WalletError::from(CredentialError::Transport("reset".into())).is_retryable());
        assert!(WalletError::from(CredentialError::InvalidShape("x".into())).is_retryable());
        assert!(!WalletError::from(CredentialError::Upstream {
            status: 401,
            body: String::new()
        })
        .is_retryable());
        assert_eq!(Stage::Funding.to_string(), "funding");
    }
}
