//! Conversion between human-readable token amounts and base units.
//!
//! Amounts are plain decimal strings (`"100000000"`, `"1.5"`). Parsing is
//! strict: anything that cannot be represented exactly in base units is an
//! error rather than being rounded or truncated.

use ethers::types::U256;
use thiserror::Error;

/// Decimals used by the token standard, 1 token = 10^18 base units.
pub const TOKEN_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("invalid character {0:?} in amount")]
    InvalidCharacter(char),
    #[error("amount must have digits on both sides of the decimal point")]
    MalformedDecimalPoint,
    #[error("amount has more than {0} fractional digits")]
    TooPrecise(u32),
    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Parses a whole-token amount into base units with 18 decimals.
pub fn parse_ether(amount: &str) -> Result<U256, AmountError> {
    parse_units(amount, TOKEN_DECIMALS)
}

pub fn format_ether(value: U256) -> String {
    format_units(value, TOKEN_DECIMALS)
}

pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AmountError> {
    let amount = amount.trim();

    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    if amount.starts_with('-') {
        return Err(AmountError::Negative);
    }

    if let Some(c) = amount.chars().find(|c| !c.is_ascii_digit() && *c != '.')
    {
        return Err(AmountError::InvalidCharacter(c));
    }

    let (integer, fraction) = match amount.split_once('.') {
        Some((integer, fraction)) => {
            if integer.is_empty()
                || fraction.is_empty()
                || fraction.contains('.')
            {
                return Err(AmountError::MalformedDecimalPoint);
            }
            (integer, fraction)
        }
        None => (amount, ""),
    };

    if fraction.len() > decimals as usize {
        return Err(AmountError::TooPrecise(decimals));
    }
    let padding = decimals as usize - fraction.len();

    let unit = unit(decimals).ok_or(AmountError::Overflow)?;

    let integer =
        U256::from_dec_str(integer).map_err(|_| AmountError::Overflow)?;

    let scaled = integer.checked_mul(unit).ok_or(AmountError::Overflow)?;

    if fraction.is_empty() {
        return Ok(scaled);
    }

    // at most `decimals` digits, so this stays below 10^decimals
    let fraction = U256::from_dec_str(fraction)
        .map_err(|_| AmountError::Overflow)?
        * U256::exp10(padding);

    scaled.checked_add(fraction).ok_or(AmountError::Overflow)
}

/// `10^decimals`, or `None` when it does not fit in 256 bits.
fn unit(decimals: u32) -> Option<U256> {
    U256::from(10).checked_pow(U256::from(decimals))
}

/// Formats base units as a canonical decimal amount.
///
/// Canonical means no leading zeros in the integer part and no trailing
/// zeros in the fraction, so canonical inputs to [`parse_units`] come back
/// unchanged.
pub fn format_units(value: U256, decimals: u32) -> String {
    // every value is below 10^78, so the integer part is zero beyond that
    let Some(unit) = unit(decimals) else {
        let digits = value.to_string();
        let padding = decimals as usize - digits.len();
        let fraction = format!("{}{digits}", "0".repeat(padding));

        return match fraction.trim_end_matches('0') {
            "" => "0".to_string(),
            fraction => format!("0.{fraction}"),
        };
    };

    let integer = value / unit;
    let fraction = value % unit;

    if fraction.is_zero() {
        return integer.to_string();
    }

    let fraction =
        format!("{:0>width$}", fraction.to_string(), width = decimals as usize);

    format!("{integer}.{}", fraction.trim_end_matches('0'))
}
