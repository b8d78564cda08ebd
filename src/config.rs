// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup; any malformed value stops the process before it serves.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MASTER_PRIVATE_KEY` | Master secret (hex, optional `0x`) | Required |
//! | `RPC_URL` | JSON-RPC endpoint | network default |
//! | `CHAIN_ID` | EVM chain id | `137` |
//! | `CLOB_HOST` | Exchange REST host | `https://clob.polymarket.com` |
//! | `COLLATERAL_TOKEN_ADDRESS` | ERC-20 collateral token | USDC.e on Polygon |
//! | `GAS_LOW_BALANCE_THRESHOLD` | Tenant top-up trigger (native units) | `0.05` |
//! | `GAS_TOP_UP_AMOUNT` | Amount per top-up (native units) | `0.1` |
//! | `MASTER_ALERT_THRESHOLD` | Master balance warning level | `1.0` |
//! | `HEALTH_CHECK_INTERVAL_SECS` | Master balance check period | `3600` |
//! | `RPC_TIMEOUT_SECS` | Timeout for a single RPC or HTTP call | `15` |
//! | `CONFIRMATION_TIMEOUT_SECS` | Top-up confirmation wait | `120` |
//! | `TENANT_CACHE_CAPACITY` | Tenants kept per cache | `10000` |
//! | `PROXY_API_KEY` | Expected `x-api-key` header | Unset disables auth |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, U256};

use crate::blockchain::{parse_amount, NetworkConfig, NATIVE_DECIMALS, POLYGON_COLLATERAL_TOKEN};
use crate::logging::LogFormat;
use crate::wallet::{GasPolicy, MasterSecret, DEFAULT_TENANT_CAPACITY};

/// Environment variable holding the master secret.
///
/// Every tenant key is derived from it; it is also the funding account key.
pub const MASTER_PRIVATE_KEY_ENV: &str = "MASTER_PRIVATE_KEY";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const CLOB_HOST_ENV: &str = "CLOB_HOST";
pub const COLLATERAL_TOKEN_ENV: &str = "COLLATERAL_TOKEN_ADDRESS";
pub const GAS_LOW_BALANCE_THRESHOLD_ENV: &str = "GAS_LOW_BALANCE_THRESHOLD";
pub const GAS_TOP_UP_AMOUNT_ENV: &str = "GAS_TOP_UP_AMOUNT";
pub const MASTER_ALERT_THRESHOLD_ENV: &str = "MASTER_ALERT_THRESHOLD";
pub const HEALTH_CHECK_INTERVAL_ENV: &str = "HEALTH_CHECK_INTERVAL_SECS";
pub const RPC_TIMEOUT_ENV: &str = "RPC_TIMEOUT_SECS";
pub const CONFIRMATION_TIMEOUT_ENV: &str = "CONFIRMATION_TIMEOUT_SECS";
pub const TENANT_CACHE_CAPACITY_ENV: &str = "TENANT_CACHE_CAPACITY";
/// When unset, the HTTP API accepts unauthenticated requests (development only).
pub const PROXY_API_KEY_ENV: &str = "PROXY_API_KEY";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_CHAIN_ID: u64 = 137;
pub const DEFAULT_CLOB_HOST: &str = "https://clob.polymarket.com";
pub const DEFAULT_LOW_BALANCE_THRESHOLD: &str = "0.05";
pub const DEFAULT_TOP_UP_AMOUNT: &str = "0.1";
pub const DEFAULT_MASTER_ALERT_THRESHOLD: &str = "1.0";
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Fully parsed service configuration.
#[derive(Clone)]
pub struct Settings {
    pub master_secret: MasterSecret,
    pub rpc_url: String,
    pub chain_id: u64,
    pub clob_host: String,
    pub collateral_token: Address,
    pub gas_policy: GasPolicy,
    pub health_check_interval: Duration,
    pub tenant_cache_capacity: usize,
    pub api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("clob_host", &self.clob_host)
            .field("collateral_token", &self.collateral_token)
            .field("gas_policy", &self.gas_policy)
            .field("health_check_interval", &self.health_check_interval)
            .field("tenant_cache_capacity", &self.tenant_cache_capacity)
            .field("api_key_set", &self.api_key.is_some())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

/// Typed view over a variable lookup.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value; empty counts as unset.
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parsed<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        match self.get(var) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn amount(&self, var: &'static str, default: &str) -> Result<U256, ConfigError> {
        let raw = self.get(var).unwrap_or_else(|| default.to_string());
        parse_amount(&raw, NATIVE_DECIMALS).map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })
    }

    fn seconds(&self, var: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parsed(var, default)?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                var,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load settings through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let master_secret = MasterSecret::from_hex(&env.required(MASTER_PRIVATE_KEY_ENV)?)?;

        let chain_id = env.parsed(CHAIN_ID_ENV, DEFAULT_CHAIN_ID)?;
        let network = NetworkConfig::for_chain_id(chain_id);
        let rpc_url = env
            .get(RPC_URL_ENV)
            .unwrap_or_else(|| network.default_rpc_url.to_string());
        let clob_host = env
            .get(CLOB_HOST_ENV)
            .unwrap_or_else(|| DEFAULT_CLOB_HOST.to_string());

        let collateral_token = env
            .get(COLLATERAL_TOKEN_ENV)
            .unwrap_or_else(|| POLYGON_COLLATERAL_TOKEN.to_string())
            .parse::<Address>()
            .map_err(|e| ConfigError::Invalid {
                var: COLLATERAL_TOKEN_ENV,
                reason: e.to_string(),
            })?;

        let top_up_amount = env.amount(GAS_TOP_UP_AMOUNT_ENV, DEFAULT_TOP_UP_AMOUNT)?;
        if top_up_amount.is_zero() {
            return Err(ConfigError::Invalid {
                var: GAS_TOP_UP_AMOUNT_ENV,
                reason: "top-up amount must be greater than zero".to_string(),
            });
        }

        let gas_policy = GasPolicy {
            low_balance_threshold: env
                .amount(GAS_LOW_BALANCE_THRESHOLD_ENV, DEFAULT_LOW_BALANCE_THRESHOLD)?,
            top_up_amount,
            master_alert_threshold: env
                .amount(MASTER_ALERT_THRESHOLD_ENV, DEFAULT_MASTER_ALERT_THRESHOLD)?,
            rpc_timeout: env.seconds(RPC_TIMEOUT_ENV, DEFAULT_RPC_TIMEOUT_SECS)?,
            confirmation_timeout: env
                .seconds(CONFIRMATION_TIMEOUT_ENV, DEFAULT_CONFIRMATION_TIMEOUT_SECS)?,
        };

        let tenant_cache_capacity =
            env.parsed(TENANT_CACHE_CAPACITY_ENV, DEFAULT_TENANT_CAPACITY)?;
        if tenant_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: TENANT_CACHE_CAPACITY_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            master_secret,
            rpc_url,
            chain_id,
            clob_host,
            collateral_token,
            gas_policy,
            health_check_interval: env
                .seconds(HEALTH_CHECK_INTERVAL_ENV, DEFAULT_HEALTH_CHECK_INTERVAL_SECS)?,
            tenant_cache_capacity,
            api_key: env.get(PROXY_API_KEY_ENV),
            host: env.get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env.parsed(PORT_ENV, DEFAULT_PORT)?,
            log_format: env.parsed(LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::test_support::MASTER_HEX;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_with_only_master_key() {
        let s = settings(&[(MASTER_PRIVATE_KEY_ENV, MASTER_HEX)]).unwrap();
        assert_eq!(s.chain_id, 137);
        assert_eq!(s.rpc_url, "https://polygon-rpc.com");
        assert_eq!(s.clob_host, DEFAULT_CLOB_HOST);
        assert_eq!(
            s.gas_policy.low_balance_threshold,
            U256::from(50_000_000_000_000_000u64)
        );
        assert_eq!(
            s.gas_policy.top_up_amount,
            U256::from(100_000_000_000_000_000u64)
        );
        assert_eq!(
            s.gas_policy.master_alert_threshold,
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(s.health_check_interval, Duration::from_secs(3600));
        assert_eq!(s.tenant_cache_capacity, DEFAULT_TENANT_CAPACITY);
        assert!(s.api_key.is_none());
        assert_eq!(s.bind_address(), "0.0.0.0:8080");
        assert_eq!(s.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_master_key_is_fatal() {
        assert_eq!(
            settings(&[]).unwrap_err(),
            ConfigError::Missing(MASTER_PRIVATE_KEY_ENV)
        );
        assert_eq!(
            settings(&[(MASTER_PRIVATE_KEY_ENV, "  ")]).unwrap_err(),
            ConfigError::Missing(MASTER_PRIVATE_KEY_ENV)
        );
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let cases = [
            (MASTER_PRIVATE_KEY_ENV, "0xnothex"),
            (CHAIN_ID_ENV, "polygon"),
            (COLLATERAL_TOKEN_ENV, "0x1234"),
            (GAS_TOP_UP_AMOUNT_ENV, "0"),
            (GAS_LOW_BALANCE_THRESHOLD_ENV, "-1"),
            (CONFIRMATION_TIMEOUT_ENV, "0"),
            (TENANT_CACHE_CAPACITY_ENV, "0"),
            (LOG_FORMAT_ENV, "xml"),
        ];
        for (var, value) in cases {
            let mut vars = vec![(MASTER_PRIVATE_KEY_ENV, MASTER_HEX)];
            vars.retain(|(k, _)| *k != var);
            vars.push((var, value));
            match settings(&vars) {
                Err(ConfigError::Invalid { var: reported, .. }) => assert_eq!(reported, var),
                other => panic!("{var}={value} gave {other:?}"),
            }
        }
    }

    #[test]
    fn overrides_are_applied() {
        let s = settings(&[
            (MASTER_PRIVATE_KEY_ENV, MASTER_HEX),
            (CHAIN_ID_ENV, "80002"),
            (GAS_TOP_UP_AMOUNT_ENV, "0.25"),
            (PROXY_API_KEY_ENV, "secret-key"),
            (LOG_FORMAT_ENV, "json"),
            (PORT_ENV, "9000"),
        ])
        .unwrap();
        assert_eq!(s.chain_id, 80002);
        assert_eq!(s.rpc_url, "https://rpc-amoy.polygon.technology");
        assert_eq!(
            s.gas_policy.top_up_amount,
            U256::from(250_000_000_000_000_000u64)
        );
        assert_eq!(s.api_key.as_deref(), Some("secret-key"));
        assert_eq!(s.log_format, LogFormat::Json);
        assert_eq!(s.port, 9000);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let s = settings(&[
            (MASTER_PRIVATE_KEY_ENV, MASTER_HEX),
            (PROXY_API_KEY_ENV, "secret-key"),
        ])
        .unwrap();
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains(&MASTER_HEX[..16]));
    }
}
