// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Polyproxy Wallet - Multi-tenant derived wallets with gas custody
//!
//! This crate derives one signing key per tenant from a single master secret,
//! hands exchange clients a signer and API credentials for that tenant, and
//! keeps every tenant account funded with gas from the master account.
//!
//! ## Modules
//!
//! - `wallet` - Key derivation, signers, caches, credentials, gas custody
//! - `blockchain` - Polygon PoS (EVM) JSON-RPC integration
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Static API key authentication

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_support;
