//! Conversions between wei, gwei and ether
//!
//! Amounts are handled as decimal strings and exact integers; no floating
//! point is involved.

use crate::{AccountError, Result};
use num_bigint::BigUint;
use num_traits::Zero;

pub const GWEI_DECIMALS: u32 = 9;
pub const ETHER_DECIMALS: u32 = 18;

/// Parse a decimal amount (`"1.5"`) scaled by `10^decimals`
pub fn parse_units(amount: &str, decimals: u32) -> Result<BigUint> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(AccountError::InvalidAmount("empty amount".into()));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(AccountError::InvalidAmount(format!("not a decimal number: {amount}")));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AccountError::InvalidAmount(format!(
            "{amount} has more than {decimals} decimals"
        )));
    }

    let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| AccountError::InvalidAmount(format!("not a decimal number: {amount}")))
}

/// Render `value / 10^decimals` as a decimal string without trailing zeros
pub fn format_units(value: &BigUint, decimals: u32) -> String {
    let scale = BigUint::from(10u32).pow(decimals);
    let whole = value / &scale;
    let fraction = value % &scale;

    if fraction.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Ether amount to wei
pub fn to_wei(ether: &str) -> Result<BigUint> {
    parse_units(ether, ETHER_DECIMALS)
}

/// Gwei amount to wei
pub fn gwei_to_wei(gwei: &str) -> Result<BigUint> {
    parse_units(gwei, GWEI_DECIMALS)
}

/// Wei amount in ether
pub fn to_ether(wei: &BigUint) -> String {
    format_units(wei, ETHER_DECIMALS)
}

/// Wei amount in gwei
pub fn to_gwei(wei: &BigUint) -> String {
    format_units(wei, GWEI_DECIMALS)
}
