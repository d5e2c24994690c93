//! Decimal string conversion at a fixed fractional precision
//!
//! `parse_units("1.5", 18)` is `1_500_000_000_000_000_000`; `format_units`
//! is its inverse with trailing zeros trimmed.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::Zero;

use crate::math::MathError;

/// Parse a `whole[.fraction]` decimal string into its scaled integer form
///
/// Fraction digits beyond `decimals` are truncated. Signs, exponents,
/// separators and empty input are rejected.
pub fn parse_units(units: &str, decimals: u32) -> Result<BigUint, MathError> {
    let invalid = || MathError::InvalidDecimal(units.to_string());

    let (whole, fraction) = match units.split_once('.') {
        Some((w, f)) => (w, f),
        None => (units, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole = if whole.is_empty() {
        BigUint::zero()
    } else {
        whole.parse::<BigUint>().map_err(|_| invalid())?
    };

    let mut padded: String = fraction.chars().take(decimals as usize).collect();
    while padded.len() < decimals as usize {
        padded.push('0');
    }
    let fraction = if padded.is_empty() {
        BigUint::zero()
    } else {
        padded.parse::<BigUint>().map_err(|_| invalid())?
    };

    Ok(whole * BigUint::from(10u32).pow(decimals) + fraction)
}

/// Format a scaled integer as a decimal string
///
/// Trailing fractional zeros and a bare trailing dot are trimmed, so whole
/// values print without a fractional part.
pub fn format_units(value: &BigUint, decimals: u32) -> String {
    let unit = BigUint::from(10u32).pow(decimals);
    let (whole, fraction) = value.div_rem(&unit);

    let fraction = format!("{:0>width$}", fraction.to_str_radix(10), width = decimals as usize);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_str_radix(10)
    } else {
        format!("{}.{}", whole, fraction)
    }
}

pub fn parse_ether(ether: &str) -> Result<BigUint, MathError> {
    parse_units(ether, 18)
}

pub fn format_ether(wei: &BigUint) -> String {
    format_units(wei, 18)
}

pub fn parse_ray(ray: &str) -> Result<BigUint, MathError> {
    parse_units(ray, 27)
}

pub fn format_ray(ray: &BigUint) -> String {
    format_units(ray, 27)
}

/// Basis points as a percentage string (`1234` -> `"12.34"`)
pub fn format_bps(bps: &BigUint) -> String {
    format_units(bps, 2)
}
