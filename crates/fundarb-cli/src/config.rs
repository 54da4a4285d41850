//! Application configuration.

use std::path::PathBuf;

use alloy::primitives::Address;
use fundarb_client::{MAINNET_API_URL, TESTNET_API_URL};
use fundarb_core::PriceFormatConfig;
use fundarb_signer::KeySource;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Env var consulted when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "FUNDARB_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Trade parameters for `open` / `close`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Leverage set before opening (overridable per command).
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Cross (true) or isolated (false) margin.
    #[serde(default)]
    pub is_cross: bool,
    /// Price concession for the opening short, in bps of mid.
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: Decimal,
    /// Price concession for the closing buy, in bps of mid.
    #[serde(default = "default_close_slippage_bps")]
    pub close_slippage_bps: Decimal,
    /// `agentName` for the approval. Unnamed delegates replace each other.
    #[serde(default)]
    pub delegate_label: Option<String>,
    /// Cap on actions a delegate may sign before it refuses.
    #[serde(default)]
    pub delegate_max_actions: Option<u32>,
}

fn default_leverage() -> u32 {
    1
}

fn default_slippage_bps() -> Decimal {
    Decimal::new(8, 1)
}

fn default_close_slippage_bps() -> Decimal {
    Decimal::from(10)
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            leverage: default_leverage(),
            is_cross: false,
            slippage_bps: default_slippage_bps(),
            close_slippage_bps: default_close_slippage_bps(),
            delegate_label: None,
            delegate_max_actions: None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mainnet (true) or testnet (false). Default: testnet.
    #[serde(default)]
    pub is_mainnet: bool,
    /// API root; defaults to the public endpoint of the selected network.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Primary account address ("0x..."). Verified against the loaded key.
    #[serde(default)]
    pub user_address: Option<String>,
    /// Env var holding the primary wallet key (hex).
    #[serde(default)]
    pub private_key_env: Option<String>,
    /// File holding the primary wallet key (hex). Takes precedence over the env var.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,
    /// Vault or subaccount to trade for. Affects the signed hash.
    #[serde(default)]
    pub vault_address: Option<String>,
    #[serde(default)]
    pub trade: TradeConfig,
    #[serde(default)]
    pub price_format: PriceFormatConfig,
}

impl AppConfig {
    /// `--config` > `FUNDARB_CONFIG` > `config/default.toml`
    pub fn resolve_path(cli_path: Option<String>) -> String {
        cli_path
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn api_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.clone(),
            None if self.is_mainnet => MAINNET_API_URL.to_string(),
            None => TESTNET_API_URL.to_string(),
        }
    }

    /// Where to read the primary wallet key from.
    pub fn key_source(&self) -> AppResult<KeySource> {
        if let Some(path) = &self.private_key_file {
            return Ok(KeySource::File { path: path.clone() });
        }
        if let Some(var_name) = &self.private_key_env {
            return Ok(KeySource::EnvVar {
                var_name: var_name.clone(),
            });
        }
        Err(AppError::Config(
            "set private_key_file or private_key_env to sign actions".to_string(),
        ))
    }

    pub fn user_address(&self) -> AppResult<Option<Address>> {
        parse_address("user_address", self.user_address.as_deref())
    }

    pub fn vault_address(&self) -> AppResult<Option<Address>> {
        parse_address("vault_address", self.vault_address.as_deref())
    }
}

fn parse_address(field: &str, value: Option<&str>) -> AppResult<Option<Address>> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<Address>()
                .map_err(|e| AppError::Config(format!("Invalid {field} {raw}: {e}")))
        })
        .transpose()
}
