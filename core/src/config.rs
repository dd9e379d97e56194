//! Runtime engine configuration, converted from the TOML layout in `zaswap-config`.

use std::time::Duration;

use thiserror::Error;
use zaswap_config::ZaswapConfig;

use crate::amount::FixedRate;
use crate::authorization::Eip712Domain;
use crate::types::{Address, HexError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is not a valid address: {source}")]
    InvalidAddress {
        field: &'static str,
        #[source]
        source: HexError,
    },
    #[error("{0} is not set (zero address)")]
    MissingAddress(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub token_address: Address,
    pub swap_address: Address,
    pub decryption_domain: Eip712Domain,
    pub quote_debounce: Duration,
    pub decrypt_window_days: u32,
    pub sentinel_shortcut: bool,
    pub rate: FixedRate,
}

impl EngineConfig {
    pub fn from_config(config: &ZaswapConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            chain_id: config.network.chain_id,
            chain_name: config.network.chain_name.clone(),
            token_address: required_address("contracts.token_address", &config.contracts.token_address)?,
            swap_address: required_address("contracts.swap_address", &config.contracts.swap_address)?,
            decryption_domain: Eip712Domain {
                name: config.relayer.domain_name.clone(),
                version: config.relayer.domain_version.clone(),
                chain_id: config.network.chain_id,
                verifying_contract: required_address(
                    "relayer.decryption_contract",
                    &config.relayer.decryption_contract,
                )?,
            },
            quote_debounce: Duration::from_millis(config.engine.quote_debounce_ms),
            decrypt_window_days: config.engine.decrypt_window_days,
            sentinel_shortcut: config.engine.sentinel_shortcut,
            rate: FixedRate::new(config.engine.rate_numerator as u128),
        })
    }
}

fn required_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    let addr: Address = value
        .parse()
        .map_err(|source| ConfigError::InvalidAddress { field, source })?;
    if addr.is_zero() {
        return Err(ConfigError::MissingAddress(field));
    }
    Ok(addr)
}
