//! ZaSwap Configuration
//!
//! Shared configuration crate for the engine and its front ends.
//!
//! Handles loading configuration from:
//! 1. ZASWAP_CONFIG env var (explicit path)
//! 2. ./zaswap.toml (current directory)
//! 3. ~/.zaswap/zaswap.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "zaswap.toml";
const CONFIG_DIR_NAME: &str = ".zaswap";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_CHAIN_NAME: &str = "Sepolia";
pub const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_RELAYER_URL: &str = "https://relayer.testnet.zama.cloud";
pub const DEFAULT_DECRYPTION_CONTRACT: &str = "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1";
pub const DEFAULT_DOMAIN_NAME: &str = "Decryption";
pub const DEFAULT_DOMAIN_VERSION: &str = "1";
/// Unset deployment output
pub const UNSET_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub const DEFAULT_QUOTE_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_DECRYPT_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_RATE_NUMERATOR: u64 = 3300;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZaswapConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub engine: EngineTomlConfig,
}

/// Chain the engine is allowed to transact on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_chain_name")]
    pub chain_name: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            chain_name: DEFAULT_CHAIN_NAME.into(),
            rpc_url: DEFAULT_RPC_URL.into(),
        }
    }
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}
fn default_chain_name() -> String {
    DEFAULT_CHAIN_NAME.into()
}
fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.into()
}

/// Deployment outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_unset_address")]
    pub token_address: String,
    #[serde(default = "default_unset_address")]
    pub swap_address: String,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            token_address: UNSET_ADDRESS.into(),
            swap_address: UNSET_ADDRESS.into(),
        }
    }
}

fn default_unset_address() -> String {
    UNSET_ADDRESS.into()
}

/// Decryption relayer and its EIP-712 domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(default = "default_relayer_url")]
    pub url: String,
    #[serde(default = "default_decryption_contract")]
    pub decryption_contract: String,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_domain_version")]
    pub domain_version: String,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAYER_URL.into(),
            decryption_contract: DEFAULT_DECRYPTION_CONTRACT.into(),
            domain_name: DEFAULT_DOMAIN_NAME.into(),
            domain_version: DEFAULT_DOMAIN_VERSION.into(),
        }
    }
}

fn default_relayer_url() -> String {
    DEFAULT_RELAYER_URL.into()
}
fn default_decryption_contract() -> String {
    DEFAULT_DECRYPTION_CONTRACT.into()
}
fn default_domain_name() -> String {
    DEFAULT_DOMAIN_NAME.into()
}
fn default_domain_version() -> String {
    DEFAULT_DOMAIN_VERSION.into()
}

/// Engine tuning (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineTomlConfig {
    #[serde(default = "default_quote_debounce")]
    pub quote_debounce_ms: u64,
    #[serde(default = "default_decrypt_window_days")]
    pub decrypt_window_days: u32,
    /// Resolve the all-zero handle to 0 without asking the relayer
    #[serde(default = "default_true")]
    pub sentinel_shortcut: bool,
    /// Whole tokens per whole native unit
    #[serde(default = "default_rate_numerator")]
    pub rate_numerator: u64,
}

impl Default for EngineTomlConfig {
    fn default() -> Self {
        Self {
            quote_debounce_ms: DEFAULT_QUOTE_DEBOUNCE_MS,
            decrypt_window_days: DEFAULT_DECRYPT_WINDOW_DAYS,
            sentinel_shortcut: true,
            rate_numerator: DEFAULT_RATE_NUMERATOR,
        }
    }
}

fn default_quote_debounce() -> u64 {
    DEFAULT_QUOTE_DEBOUNCE_MS
}
fn default_decrypt_window_days() -> u32 {
    DEFAULT_DECRYPT_WINDOW_DAYS
}
fn default_true() -> bool {
    true
}
fn default_rate_numerator() -> u64 {
    DEFAULT_RATE_NUMERATOR
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ZaswapConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check ZASWAP_CONFIG env var
        if let Ok(path) = env::var("ZASWAP_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("ZASWAP_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./zaswap.toml
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.zaswap/zaswap.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Network
        env_parse("ZASWAP_CHAIN_ID", &mut self.network.chain_id);
        env_string("ZASWAP_CHAIN_NAME", &mut self.network.chain_name);
        env_string("ZASWAP_RPC_URL", &mut self.network.rpc_url);

        // Contracts
        env_string("ZASWAP_TOKEN_ADDRESS", &mut self.contracts.token_address);
        env_string("ZASWAP_SWAP_ADDRESS", &mut self.contracts.swap_address);

        // Relayer
        env_string("ZASWAP_RELAYER_URL", &mut self.relayer.url);
        env_string(
            "ZASWAP_DECRYPTION_CONTRACT",
            &mut self.relayer.decryption_contract,
        );

        // Engine
        env_parse("ZASWAP_QUOTE_DEBOUNCE_MS", &mut self.engine.quote_debounce_ms);
        env_parse(
            "ZASWAP_DECRYPT_WINDOW_DAYS",
            &mut self.engine.decrypt_window_days,
        );
        if let Some(v) = env_bool("ZASWAP_SENTINEL_SHORTCUT") {
            self.engine.sentinel_shortcut = v;
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================
