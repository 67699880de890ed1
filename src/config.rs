//! Configuration management for the operator console
//!
//! Secrets come from the process environment (optionally seeded from a `.env`
//! file). Everything else is read from an optional TOML file with environment
//! variable substitution.

use crate::error::{ConsoleError, ConsoleResult};

use ethers::signers::LocalWallet;
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding the signing key
pub const PRIVATE_KEY_ENV: &str = "CONSOLE_PRIVATE_KEY";
/// Environment variable holding the target contract address
pub const CONTRACT_ADDRESS_ENV: &str = "CONSOLE_CONTRACT_ADDRESS";
/// Environment variable pointing at the settings file
pub const CONFIG_PATH_ENV: &str = "CONSOLE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/console.toml";

lazy_static! {
    static ref ENV_PLACEHOLDER: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub contract: ContractConfig,
    pub gas: GasConfig,
    pub price_feed: PriceFeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub rpc_url: String,
    pub poll_interval_ms: u64,
    pub confirmations: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            poll_interval_ms: 4_000,
            confirmations: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub interface_path: PathBuf,
    pub operations: OperationNames,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            interface_path: PathBuf::from("contract.json"),
            operations: OperationNames::default(),
        }
    }
}

/// Contract function names backing each console action
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperationNames {
    pub activate: String,
    pub deactivate: String,
    pub withdraw: String,
    /// Read-only function reporting the contract balance. When unset the
    /// native balance of the contract address is shown instead.
    pub balance: Option<String>,
}

impl Default for OperationNames {
    fn default() -> Self {
        Self {
            activate: "start".to_string(),
            deactivate: "stop".to_string(),
            withdraw: "withdrawal".to_string(),
            balance: None,
        }
    }
}

/// Fixed gas ceilings per action kind
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub activate_limit: u64,
    pub deactivate_limit: u64,
    pub withdraw_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            activate_limit: 300_000,
            deactivate_limit: 300_000,
            withdraw_limit: 300_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub base_url: String,
    pub vs_currency: String,
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            limit: 10,
            timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Load settings from the configured file, falling back to defaults when
    /// no file exists at that path
    pub fn load() -> ConsoleResult<Self> {
        let config_path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let settings = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            tracing::debug!("No settings file at {:?}, using defaults", config_path);
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Parse a settings file
    pub fn from_file(path: &Path) -> ConsoleResult<Self> {
        let config_str = std::fs::read_to_string(path).map_err(|e| {
            ConsoleError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(input: &str) -> ConsoleResult<Self> {
        let config_str = substitute_env_vars(input);
        toml::from_str(&config_str)
            .map_err(|e| ConsoleError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> ConsoleResult<()> {
        if self.node.rpc_url.trim().is_empty() {
            return Err(ConsoleError::Config("node.rpc_url is empty".to_string()));
        }
        if self.node.confirmations == 0 {
            return Err(ConsoleError::Config("node.confirmations must be at least 1".to_string()));
        }

        for (name, limit) in [
            ("activate_limit", self.gas.activate_limit),
            ("deactivate_limit", self.gas.deactivate_limit),
            ("withdraw_limit", self.gas.withdraw_limit),
        ] {
            if limit == 0 {
                return Err(ConsoleError::Config(format!("gas.{} must be positive", name)));
            }
        }

        if !(1..=250).contains(&self.price_feed.limit) {
            return Err(ConsoleError::Config(format!(
                "price_feed.limit must be within 1..=250, got {}",
                self.price_feed.limit
            )));
        }

        Ok(())
    }
}

/// Startup secrets read from the environment
pub struct Secrets {
    pub wallet: LocalWallet,
    pub contract_address: Address,
}

impl Secrets {
    /// Read the signing key and contract address. Absence of either is fatal.
    pub fn from_env() -> ConsoleResult<Self> {
        let key = required_env(PRIVATE_KEY_ENV)?;
        let address = required_env(CONTRACT_ADDRESS_ENV)?;
        Self::parse(&key, &address)
    }

    pub fn parse(key: &str, address: &str) -> ConsoleResult<Self> {
        let wallet = key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| ConsoleError::Config(format!("Invalid private key: {}", e)))?;

        let contract_address = address
            .trim()
            .parse::<Address>()
            .map_err(|e| ConsoleError::Config(format!("Invalid contract address: {}", e)))?;

        Ok(Self {
            wallet,
            contract_address,
        })
    }
}

fn required_env(name: &str) -> ConsoleResult<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConsoleError::Config(format!("{} is not set", name))),
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_PLACEHOLDER
        .replace_all(input, |cap: &regex::Captures| {
            env::var(&cap[1]).unwrap_or_default()
        })
        .into_owned()
}
