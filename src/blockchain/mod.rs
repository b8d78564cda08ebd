// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module for Polygon PoS (and other EVM chains).
//!
//! This module provides functionality for:
//! - Querying native and ERC-20 collateral balances
//! - Broadcasting signed transactions and waiting for confirmation
//! - Converting between human-readable amounts and wei

pub mod client;
pub mod erc20;
pub mod provider;
pub mod transactions;
pub mod types;

pub use client::RpcProvider;
pub use provider::{ChainError, ChainProvider, TxReceipt};
pub use transactions::{format_amount, native_transfer, parse_amount, NATIVE_TRANSFER_GAS};
pub use types::*;
