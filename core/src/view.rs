//! Presentation snapshot kept by the orchestrator.

use crate::amount::TokenAmount;
use crate::handle::EncryptedHandle;
use crate::quote::Quote;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub quote: Option<Quote>,
    pub quote_error: Option<String>,
    pub swap_status: Option<String>,
    pub swapping: bool,
    pub handle: Option<EncryptedHandle>,
    pub clear_balance: Option<TokenAmount>,
    pub decrypting: bool,
    pub balance_status: Option<String>,
}

impl View {
    /// "3300 cUSDT", or "--" without a quote
    pub fn formatted_quote(&self) -> String {
        match &self.quote {
            Some(q) => q.output.to_string(),
            None => "--".to_string(),
        }
    }

    pub fn masked_handle(&self) -> Option<String> {
        self.handle.map(|h| h.masked())
    }

    pub fn clear_balance_text(&self) -> Option<String> {
        self.clear_balance.map(|b| b.to_string())
    }

    pub(crate) fn reset_quote(&mut self) {
        self.quote = None;
        self.quote_error = None;
    }

    pub(crate) fn reset_balance(&mut self) {
        self.handle = None;
        self.clear_balance = None;
        self.balance_status = None;
    }
}
