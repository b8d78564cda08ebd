// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! The orchestrator in front of this service authenticates with a static
//! shared key in the `x-api-key` header.
//!
//! ## Security
//!
//! - All `/v1` endpoints require the key when `PROXY_API_KEY` is set
//! - Health and docs endpoints are public
//! - Keys are compared in constant time (HMAC tag verification)
//! - With no key configured every request is accepted (development only)

pub mod error;
pub mod extractor;

use hmac::{Hmac, Mac};
use sha2::Sha256;

pub use error::AuthError;
pub use extractor::ProxyAuth;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Domain tag every key is MACed over.
const KEY_CHECK_DOMAIN: &[u8] = b"polyproxy/api-key/v1";

/// Checks presented keys against the configured one without leaking timing.
///
/// Only an HMAC tag of the expected key is kept; presented keys are tagged
/// the same way and compared with `verify_slice`.
pub struct ApiKeyVerifier {
    expected_tag: Vec<u8>,
}

fn key_mac(key: &str) -> Hmac<Sha256> {
    <Hmac<Sha256> as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length")
        .chain_update(KEY_CHECK_DOMAIN)
}

impl ApiKeyVerifier {
    pub fn new(expected: &str) -> Self {
        Self {
            expected_tag: key_mac(expected).finalize().into_bytes().to_vec(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        key_mac(presented).verify_slice(&self.expected_tag).is_ok()
    }
}
