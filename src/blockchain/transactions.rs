// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction requests and amount conversion.

use alloy::{
    primitives::{Address, U256},
    rpc::types::TransactionRequest,
};

use super::provider::ChainError;

/// Gas used by a plain native transfer to an externally owned account.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Build an unsigned native token transfer.
///
/// Nonce, gas price and chain id are left empty; the sending signer fills
/// them from its bound provider.
pub fn native_transfer(to: Address, amount_wei: U256) -> TransactionRequest {
    TransactionRequest::default()
        .to(to)
        .value(amount_wei)
        .gas_limit(NATIVE_TRANSFER_GAS)
}

/// Parse a human-readable amount to wei (or token units).
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for POL, 6 for USDC)
///
/// # Returns
/// * `Ok(U256)` - Amount in smallest unit
/// * `Err` - If parsing fails
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, ChainError> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 || parts[0].is_empty() {
        return Err(ChainError::InvalidAmount(format!(
            "Invalid amount format: {amount:?}"
        )));
    }

    let whole = parts[0]
        .parse::<u128>()
        .map_err(|_| ChainError::InvalidAmount("Invalid whole number".to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(ChainError::InvalidAmount(format!(
                "Too many decimal places (max {})",
                decimals
            )));
        }
        if !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(ChainError::InvalidAmount("Invalid decimal".to_string()));
        }
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| ChainError::InvalidAmount("Invalid decimal".to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| ChainError::InvalidAmount("Amount overflow".to_string()))?;

    Ok(U256::from(total))
}

/// Format wei (or token units) to a human-readable amount, truncated to six
/// decimal places.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, &trimmed[..trimmed.len().min(6)])
        }
    }
}
