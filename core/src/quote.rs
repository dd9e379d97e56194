//! Debounced on-chain quotes.

use std::time::Duration;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::abi::{self, ContractCall, Word};
use crate::amount::{NativeAmount, TokenAmount};
use crate::client::ChainReader;
use crate::error::{EngineError, Result};
use crate::freshness::{Generation, Settled, Ticket};
use crate::types::Address;

/// Token output for a native input, valid while `as_of` is the latest ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub input: NativeAmount,
    pub output: TokenAmount,
    pub as_of: Ticket,
}

pub struct QuoteFetcher {
    swap_contract: Address,
    debounce: Duration,
    generation: Generation,
}

impl QuoteFetcher {
    pub fn new(swap_contract: Address, debounce: Duration) -> Self {
        Self {
            swap_contract,
            debounce,
            generation: Generation::new(),
        }
    }

    /// Whether `quote` still belongs to the latest input
    pub fn is_fresh(&self, quote: &Quote) -> bool {
        self.generation.is_current(quote.as_of)
    }

    /// Quotes `input` through the swap contract.
    ///
    /// Each call supersedes every earlier one, including calls still waiting on the
    /// debounce or the read. Invalid input settles to `Current(None)` without touching
    /// the chain.
    pub async fn fetch<R: ChainReader>(
        &self,
        reader: &R,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Settled<Option<Quote>>> {
        let ticket = self.generation.issue();

        let amount = match NativeAmount::parse_ether(input) {
            Ok(amount) => amount,
            Err(e) => {
                debug!("quote #{}: no quote for {:?}: {}", ticket.value(), input, e);
                return Ok(Settled::Current(None));
            }
        };

        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
            if !self.generation.admits(ticket, cancel) {
                debug!("quote #{}: superseded while debouncing", ticket.value());
                return Ok(Settled::Stale);
            }
        }

        let call = ContractCall::new(self.swap_contract, abi::QUOTE, vec![Word::Uint(amount.raw())]);
        debug!("quote #{}: reading quote for {}", ticket.value(), amount);
        let result = reader.read(&call).await;

        if !self.generation.admits(ticket, cancel) {
            debug!("quote #{}: discarding stale result", ticket.value());
            return Ok(Settled::Stale);
        }

        let data = result.map_err(|e| {
            warn!("quote #{}: read failed: {}", ticket.value(), e);
            EngineError::QuoteUnavailable
        })?;
        let raw = abi::decode_uint(&data).map_err(|e| {
            warn!("quote #{}: bad return data: {}", ticket.value(), e);
            EngineError::QuoteUnavailable
        })?;

        Ok(Settled::Current(Some(Quote {
            input: amount,
            output: TokenAmount::from_raw(raw),
            as_of: ticket,
        })))
    }
}
