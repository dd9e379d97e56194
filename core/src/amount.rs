//! Integer amounts in an asset's smallest unit.
//!
//! Native (wei, 18 decimals) and token (6 decimals) amounts are distinct types; the
//! only way across is [`FixedRate::convert`].

use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

/// Decimal denomination of an asset
pub trait Unit {
    const DECIMALS: u32;
    const SYMBOL: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Native;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token;

impl Unit for Native {
    const DECIMALS: u32 = 18;
    const SYMBOL: &'static str = "ETH";
}

impl Unit for Token {
    const DECIMALS: u32 = 6;
    const SYMBOL: &'static str = "cUSDT";
}

/// Amount of native asset in wei
pub type NativeAmount = Amount<Native>;
/// Amount of the confidential token in its smallest unit
pub type TokenAmount = Amount<Token>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount is negative")]
    Negative,
    #[error("amount is not a decimal number: {0:?}")]
    Malformed(String),
    #[error("amount has more than {max} fraction digits")]
    TooPrecise { max: u32 },
    #[error("amount is too large")]
    Overflow,
    #[error("amount must be greater than zero")]
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount<U> {
    raw: u128,
    unit: PhantomData<U>,
}

impl<U: Unit> Amount<U> {
    pub const ZERO: Self = Self::from_raw(0);

    pub const fn from_raw(raw: u128) -> Self {
        Self {
            raw,
            unit: PhantomData,
        }
    }

    /// Value in the smallest unit
    pub const fn raw(&self) -> u128 {
        self.raw
    }

    pub const fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Parses a human decimal string ("0.1") into smallest units.
    ///
    /// Only plain decimal notation is accepted; zero is rejected because no quote or
    /// swap is meaningful for it.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let raw = parse_units(input, U::DECIMALS)?;
        if raw == 0 {
            return Err(AmountError::Zero);
        }
        Ok(Self::from_raw(raw))
    }

    /// Human decimal string, trailing zeros trimmed ("3300", "0.25")
    pub fn format_units(&self) -> String {
        let scale = pow10(U::DECIMALS);
        let whole = self.raw / scale;
        let frac = self.raw % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let digits = format!("{:0width$}", frac, width = U::DECIMALS as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl NativeAmount {
    /// Parses an ether-denominated string into wei
    pub fn parse_ether(input: &str) -> Result<Self, AmountError> {
        Self::parse(input)
    }
}

impl<U: Unit> fmt::Display for Amount<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.format_units(), U::SYMBOL)
    }
}

/// Fixed conversion: one whole native unit buys `tokens_per_native` whole tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRate {
    tokens_per_native: u128,
}

impl FixedRate {
    pub const fn new(tokens_per_native: u128) -> Self {
        Self { tokens_per_native }
    }

    pub const fn tokens_per_native(&self) -> u128 {
        self.tokens_per_native
    }

    /// wei * rate * 10^6 / 10^18, floored. `None` on overflow.
    pub fn convert(&self, amount: NativeAmount) -> Option<TokenAmount> {
        let scaled = amount
            .raw()
            .checked_mul(self.tokens_per_native)?
            .checked_mul(pow10(Token::DECIMALS))?;
        Some(TokenAmount::from_raw(scaled / pow10(Native::DECIMALS)))
    }
}

fn pow10(exp: u32) -> u128 {
    10u128.pow(exp)
}

fn parse_units(input: &str, decimals: u32) -> Result<u128, AmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AmountError::Empty);
    }
    if input.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Malformed(input.to_string()));
    }
    if frac.len() > decimals as usize {
        return Err(AmountError::TooPrecise { max: decimals });
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        // at most 18 digits, always fits
        frac.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac_scaled = frac_value * pow10(decimals - frac.len() as u32);

    whole
        .checked_mul(pow10(decimals))
        .and_then(|w| w.checked_add(frac_scaled))
        .ok_or(AmountError::Overflow)
}
