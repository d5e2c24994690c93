//! Risk-premium accrual via ghost shares and offset
//!
//! No single index can price every user's premium because every user has its
//! own rate. Instead each user records:
//!
//! - `ghost_drawn_shares`: its base drawn shares scaled by its own rate
//! - `offset`: the ghost value (`ghost * index`) at the moment ghost shares were set
//!
//! Premium accrued since then is `ghost * index - offset`. Every principal or
//! rate change first realises that amount into `unrealised_premium`, then
//! re-anchors ghost and offset. The premium value is linear in the three
//! fields, so a spoke or the hub prices all of its users' premium from the
//! sums alone.
//!
//! `offset` and `unrealised_premium` are kept ray-scaled (asset * RAY). This
//! keeps every sum exact; rounding happens once, upward, when premium is read
//! in asset units.

use num_bigint::BigUint;
use num_traits::One;

use fixed_point::{mul_div, percent_mul, ray, Rounding};

use crate::position::{Field, LedgerDelta, LedgerFields};
use crate::{LedgerError, Result};

/// Current ghost value, ray-scaled
#[inline]
pub fn ghost_value(fields: &LedgerFields, index: &BigUint) -> BigUint {
    &fields.ghost_drawn_shares * index
}

/// Premium accrued since the last re-anchor, ray-scaled
///
/// # Returns
/// `ghost * index - offset`, or `Underflow` if the offset lies above the
/// current ghost value (only possible if the index moved backwards)
pub fn accrued_premium_ray(fields: &LedgerFields, index: &BigUint) -> Result<BigUint> {
    let value = ghost_value(fields, index);
    if value < fields.offset {
        return Err(LedgerError::Underflow);
    }
    Ok(value - &fields.offset)
}

/// Total outstanding premium, ray-scaled
pub fn premium_debt_ray(fields: &LedgerFields, index: &BigUint) -> Result<BigUint> {
    Ok(&fields.unrealised_premium + accrued_premium_ray(fields, index)?)
}

/// Total outstanding premium in assets, rounded up
pub fn premium_debt(fields: &LedgerFields, index: &BigUint) -> Result<BigUint> {
    let owed = premium_debt_ray(fields, index)?;
    Ok(mul_div(&owed, &BigUint::one(), &ray(), Rounding::Up)?)
}

/// Ghost shares for a principal at a given risk premium (rounded up)
#[inline]
pub fn ghost_shares_for(base_drawn_shares: &BigUint, risk_premium: u32) -> Result<BigUint> {
    Ok(percent_mul(base_drawn_shares, risk_premium, Rounding::Up)?)
}

/// Realise accrued premium and re-anchor for a new principal and rate
///
/// # Arguments
/// * `fields` - The user's current fields
/// * `new_base_drawn_shares` - Principal after the operation
/// * `risk_premium` - Rate (bps) that applies from now on
/// * `index` - Current base-debt index
///
/// # Returns
/// The delta for the premium triple. The caller adds its own base-share and
/// repayment changes on top. After applying it, `unrealised_premium` holds
/// everything accrued so far and accrued premium restarts from zero, so the
/// premium value is unchanged by the call itself.
pub fn realize_and_reanchor(
    fields: &LedgerFields,
    new_base_drawn_shares: &BigUint,
    risk_premium: u32,
    index: &BigUint,
) -> Result<LedgerDelta> {
    let accrued = accrued_premium_ray(fields, index)?;
    let ghost = ghost_shares_for(new_base_drawn_shares, risk_premium)?;
    let offset = &ghost * index;

    log::trace!(
        "realize premium: accrued_ray={} ghost {} -> {} rp={}",
        accrued,
        fields.ghost_drawn_shares,
        ghost,
        risk_premium
    );

    let mut delta = LedgerDelta::new();
    delta.increase(Field::UnrealisedPremium, &accrued);
    delta.set_change(Field::GhostDrawnShares, &fields.ghost_drawn_shares, &ghost);
    delta.set_change(Field::Offset, &fields.offset, &offset);
    Ok(delta)
}
