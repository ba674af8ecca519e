//! Conversions between atomic amounts and their display representation.
//!
//! Atomic amounts are integers in the smallest indivisible denomination of an asset (mutez, wei).
//! Display amounts are decimal strings scaled down by the asset's decimals. All arithmetic is done
//! on [`U256`], floats never enter the picture.

use crate::errors::{InvalidNumericInput, NumericInputReason};
use alloy_primitives::{
    U256,
    utils::{format_units, parse_units},
};

/// Decimals of the Tezos native asset.
pub const TEZ_DECIMALS: u8 = 6;

/// Decimals of the EVM native asset.
pub const ETHER_DECIMALS: u8 = 18;

/// Decimals used to display EVM gas prices.
pub const GWEI_DECIMALS: u8 = 9;

/// Parses a display amount into its atomic representation.
///
/// Accepts `digits [ "." digits ]`, optionally surrounded by whitespace. Signs, exponents and
/// more fractional digits than `decimals` are rejected.
pub fn to_atomic(display: &str, decimals: u8) -> Result<U256, InvalidNumericInput> {
    let input = display.trim();
    let err = |reason| InvalidNumericInput::new(display, reason);

    if input.is_empty() {
        return Err(err(NumericInputReason::Empty));
    }
    if input.starts_with('-') {
        return Err(err(NumericInputReason::Negative));
    }

    let (int, frac) = match input.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (input, None),
    };
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int.is_empty() || !is_digits(int) {
        return Err(err(NumericInputReason::Malformed));
    }
    if let Some(frac) = frac {
        if frac.is_empty() || !is_digits(frac) {
            return Err(err(NumericInputReason::Malformed));
        }
        if frac.len() > decimals as usize {
            return Err(err(NumericInputReason::TooManyDecimals { decimals }));
        }
    }

    if decimals == 0 {
        return U256::from_str_radix(int, 10).map_err(|_| err(NumericInputReason::Overflow));
    }

    parse_units(input, decimals)
        .map(|units| units.get_absolute())
        .map_err(|_| err(NumericInputReason::Overflow))
}

/// Formats an atomic amount as a canonical display amount.
///
/// The output has no trailing fractional zeros and no trailing dot, so it parses back into the
/// same atomic amount with [`to_atomic`].
pub fn to_display(atomic: U256, decimals: u8) -> String {
    if decimals == 0 {
        return atomic.to_string();
    }

    let formatted = match format_units(atomic, decimals) {
        Ok(formatted) => formatted,
        // Only reachable for decimals past 77, which no supported asset has.
        Err(_) => return atomic.to_string(),
    };

    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        formatted
    }
}

/// Parses an integer field such as a gas limit, storage limit or nonce.
pub fn parse_integer(display: &str) -> Result<u64, InvalidNumericInput> {
    let value = to_atomic(display, 0)?;
    u64::try_from(value).map_err(|_| InvalidNumericInput::new(display, NumericInputReason::Overflow))
}

/// Parses a gas price entered in gwei into wei.
pub fn parse_gwei(display: &str) -> Result<u128, InvalidNumericInput> {
    let value = to_atomic(display, GWEI_DECIMALS)?;
    u128::try_from(value).map_err(|_| InvalidNumericInput::new(display, NumericInputReason::Overflow))
}
