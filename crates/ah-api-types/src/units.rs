//! Fixed-point conversion at the contract boundary.
//!
//! Every amount crossing the contract boundary is an integer scaled by
//! `10^decimals` (18 for the payment token). Human-readable decimal strings
//! exist only on the outside of this module.

use alloy::primitives::U256;
use alloy::primitives::utils::{format_units, parse_units};
use thiserror::Error;

pub const TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is required")]
    Empty,
    #[error("invalid amount '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// Parse a decimal token amount ("2.5") into base units at 18 decimals.
pub fn parse_amount(input: &str) -> Result<U256, AmountError> {
    parse_amount_with(input, TOKEN_DECIMALS)
}

pub fn parse_amount_with(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::Invalid {
            input: trimmed.to_owned(),
            reason: "amount cannot be negative".to_owned(),
        });
    }

    let parsed = parse_units(trimmed, decimals).map_err(|err| AmountError::Invalid {
        input: trimmed.to_owned(),
        reason: err.to_string(),
    })?;

    Ok(parsed.into())
}

/// Render base units as a trimmed decimal string ("2.5", "0", "12").
pub fn to_display(amount: U256, decimals: u8) -> String {
    match format_units(amount, decimals) {
        Ok(formatted) => trim_fraction(&formatted),
        Err(_) => amount.to_string(),
    }
}

pub fn to_display_ether(amount: U256) -> String {
    to_display(amount, TOKEN_DECIMALS)
}

/// Unit price times quantity, `None` on overflow.
pub fn total_price(unit_price: U256, quantity: U256) -> Option<U256> {
    unit_price.checked_mul(quantity)
}

fn trim_fraction(formatted: &str) -> String {
    if !formatted.contains('.') {
        return formatted.to_owned();
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ether(whole: u128, tenths: u128) -> U256 {
        U256::from(whole * 1_000_000_000_000_000_000 + tenths * 100_000_000_000_000_000)
    }

    #[test]
    fn parses_fractional_token_amounts() {
        assert_eq!(parse_amount("2.5").unwrap(), ether(2, 5));
        assert_eq!(parse_amount(" 10 ").unwrap(), ether(10, 0));
        assert_eq!(parse_amount_with("7", 0).unwrap(), U256::from(7u64));
    }

    #[test]
    fn rejects_empty_and_negative_amounts() {
        assert_eq!(parse_amount("   "), Err(AmountError::Empty));
        assert!(matches!(parse_amount("-1"), Err(AmountError::Invalid { .. })));
        assert!(matches!(parse_amount("abc"), Err(AmountError::Invalid { .. })));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(to_display_ether(ether(2, 5)), "2.5");
        assert_eq!(to_display_ether(ether(3, 0)), "3");
        assert_eq!(to_display_ether(U256::ZERO), "0");
        assert_eq!(to_display(U256::from(1234u64), 2), "12.34");
    }

    #[test]
    fn total_price_multiplies_in_base_units() {
        let total = total_price(ether(2, 5), U256::from(4u64)).unwrap();
        assert_eq!(total, ether(10, 0));
        assert!(total_price(U256::MAX, U256::from(2u64)).is_none());
    }
}
