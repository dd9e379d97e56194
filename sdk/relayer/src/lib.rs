#![allow(async_fn_in_trait)]

pub mod client;
pub mod sealed;

pub use client::{HttpRelayer, HttpRelayerConfig};
pub use sealed::{SealError, SealedValue, open_clear_value, seal_clear_value};
