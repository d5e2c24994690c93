//! Share <-> asset conversions and index advancement
//!
//! ## Rounding Rules (always favor the pool)
//!
//! | Operation | Convert         | Rounding | Reason                      |
//! |-----------|-----------------|----------|-----------------------------|
//! | Supply    | assets -> shares| DOWN     | supplier gets fewer shares  |
//! | Withdraw  | assets -> shares| UP       | supplier burns more shares  |
//! | Balance   | shares -> assets| DOWN     | supplier is owed less       |
//! | Borrow    | assets -> shares| UP       | borrower owes more shares   |
//! | Repay     | assets -> shares| DOWN     | borrower burns fewer shares |
//! | Debt      | shares -> assets| UP       | borrower owes more assets   |
//! | Fee       | assets -> shares| DOWN     | receiver gets fewer shares  |
//!
//! The supply side is priced by the pool itself: total supply assets are the
//! available liquidity plus everything owed to the pool, so the supply index
//! rises exactly as fast as debt accrues. Both totals carry a virtual offset
//! (`VIRTUAL_ASSETS` over `VIRTUAL_SHARES`), so the price starts at 1 and
//! never falls, whether or not anyone holds shares.

use num_bigint::BigUint;
use num_traits::{CheckedSub, Zero};

use fixed_point::{
    mul_div, percent_mul, percentage_factor, ray, ray_mul, Rounding, PERCENTAGE_FACTOR,
};

use crate::hub::{Debt, Hub, Ledger};
use crate::position::{Field, LedgerDelta, LedgerFields};
use crate::{
    max_uint, premium, LedgerError, Result, SECONDS_PER_YEAR, VIRTUAL_ASSETS, VIRTUAL_SHARES,
};

impl Hub {
    /// Debt owed by a set of ledger fields at the current index
    pub fn debt(&self, fields: &LedgerFields) -> Result<Debt> {
        self.debt_at(fields, &self.base_debt_index)
    }

    /// Debt owed by a set of ledger fields at an arbitrary index
    pub fn debt_at(&self, fields: &LedgerFields, index: &BigUint) -> Result<Debt> {
        Ok(Debt {
            base_debt: ray_mul(&fields.base_drawn_shares, index, Rounding::Up)?,
            premium_debt: premium::premium_debt(fields, index)?,
        })
    }

    pub fn get_debt(&self) -> Result<Debt> {
        self.debt(&self.fields)
    }

    pub fn get_total_debt(&self) -> Result<BigUint> {
        Ok(self.get_debt()?.total())
    }

    /// Pool size: unborrowed liquidity plus all outstanding debt
    pub fn total_supply_assets(&self) -> Result<BigUint> {
        Ok(&self.available_liquidity + self.get_total_debt()?)
    }

    fn priced_assets(&self) -> Result<BigUint> {
        Ok(self.total_supply_assets()? + VIRTUAL_ASSETS)
    }

    fn priced_shares(&self) -> BigUint {
        &self.fields.supplied_shares + VIRTUAL_SHARES
    }

    /// Assets per supplied share, ray-scaled
    pub fn supply_index(&self) -> Result<BigUint> {
        Ok(mul_div(
            &self.priced_assets()?,
            &ray(),
            &self.priced_shares(),
            Rounding::Down,
        )?)
    }

    /// Supplied shares -> assets (rounded down)
    pub fn to_supply_assets(&self, shares: &BigUint) -> Result<BigUint> {
        Ok(mul_div(
            shares,
            &self.priced_assets()?,
            &self.priced_shares(),
            Rounding::Down,
        )?)
    }

    /// Assets -> supplied shares
    ///
    /// Down when minting (supply), Up when burning (withdraw).
    pub fn to_supplied_shares(&self, assets: &BigUint, rounding: Rounding) -> Result<BigUint> {
        Ok(mul_div(
            assets,
            &self.priced_shares(),
            &self.priced_assets()?,
            rounding,
        )?)
    }

    /// Base drawn shares -> assets (rounded up)
    pub fn to_drawn_assets(&self, shares: &BigUint) -> Result<BigUint> {
        Ok(ray_mul(shares, &self.base_debt_index, Rounding::Up)?)
    }

    /// Assets -> base drawn shares
    ///
    /// Up when minting (borrow), Down when burning (repay).
    pub fn to_drawn_shares(&self, assets: &BigUint, rounding: Rounding) -> Result<BigUint> {
        Ok(mul_div(assets, &ray(), &self.base_debt_index, rounding)?)
    }

    /// Interest the pool earns if the index moves from the current value to
    /// `next`: base growth plus premium growth, each priced as debt is
    pub fn accrued_interest(&self, next: &BigUint) -> Result<BigUint> {
        let before = self.get_total_debt()?;
        let after = self.debt_at(&self.fields, next)?.total();
        after.checked_sub(&before).ok_or(LedgerError::Underflow)
    }

    /// Fee share of the interest accrued up to `next` (rounded down)
    pub fn liquidity_fee(&self, next: &BigUint, fee_bps: u32) -> Result<BigUint> {
        if fee_bps > PERCENTAGE_FACTOR {
            return Err(LedgerError::InvalidFee(fee_bps));
        }
        Ok(percent_mul(&self.accrued_interest(next)?, fee_bps, Rounding::Down)?)
    }

    /// Supplied shares minted for `fee` once the index stands at `next`
    ///
    /// The fee is bought in at the post-accrual price of the pool without the
    /// fee, like a supply of `fee` assets, so no holder's price falls.
    pub fn fee_shares(&self, fee: &BigUint, next: &BigUint) -> Result<BigUint> {
        let debt = self.debt_at(&self.fields, next)?.total();
        let assets = (&self.available_liquidity + debt + VIRTUAL_ASSETS)
            .checked_sub(fee)
            .ok_or(LedgerError::Underflow)?;
        Ok(mul_div(fee, &self.priced_shares(), &assets, Rounding::Down)?)
    }

    /// Reject an index below the current one, or one whose hub ghost value
    /// would not fit in MAX_UINT
    pub(crate) fn check_index(&self, new_index: &BigUint) -> Result<()> {
        if new_index < &self.base_debt_index {
            return Err(LedgerError::InvalidIndex);
        }
        let max = max_uint();
        if new_index > &max || premium::ghost_value(&self.fields, new_index) > max {
            return Err(LedgerError::Overflow);
        }
        Ok(())
    }

    /// Move the base-debt index to `new_index`
    ///
    /// # Returns
    /// `InvalidIndex` if `new_index` is below the current index, `Overflow` if
    /// the hub's ghost value at the new index would not fit in MAX_UINT
    pub(crate) fn advance_base_debt_index(&mut self, new_index: BigUint) -> Result<()> {
        self.check_index(&new_index)?;

        log::debug!(
            "base debt index {} -> {}",
            fixed_point::format_ray(&self.base_debt_index),
            fixed_point::format_ray(&new_index)
        );
        self.base_debt_index = new_index;
        Ok(())
    }
}

/// Linear growth factor over `elapsed_secs` at an annual rate in bps
///
/// `RAY + RAY * rate_bps * elapsed / (10_000 * SECONDS_PER_YEAR)`, rounded down.
pub fn linear_growth(rate_bps: u32, elapsed_secs: u64) -> Result<BigUint> {
    let numerator = BigUint::from(rate_bps) * BigUint::from(elapsed_secs);
    let denominator = percentage_factor() * BigUint::from(SECONDS_PER_YEAR);
    Ok(ray() + mul_div(&ray(), &numerator, &denominator, Rounding::Down)?)
}

impl Ledger {
    /// Set the base-debt index directly (external accrual trigger)
    ///
    /// With a fee receiver set, `liquidity_fee` bps of the interest accrued by
    /// the move is minted to it as supplied shares in the same step.
    pub fn advance_base_debt_index(&mut self, new_index: BigUint) -> Result<()> {
        self.hub.check_index(&new_index)?;

        if let Some(receiver) = self.fee_receiver {
            let fee = self.hub.liquidity_fee(&new_index, self.params.liquidity_fee)?;
            let shares = if fee.is_zero() {
                BigUint::zero()
            } else {
                self.hub.fee_shares(&fee, &new_index)?
            };
            if !shares.is_zero() {
                let mut delta = LedgerDelta::new();
                delta.increase(Field::SuppliedShares, &shares);
                let liquidity = self.hub.available_liquidity.clone();
                self.commit(receiver, &delta, liquidity)?;
                log::debug!("liquidity fee {} minted {} shares to user {}", fee, shares, receiver.0);
            }
        }

        self.hub.advance_base_debt_index(new_index)
    }

    /// Multiply the base-debt index by a ray-scaled growth factor (>= RAY)
    pub fn accrue(&mut self, growth: &BigUint) -> Result<()> {
        if growth < &ray() {
            return Err(LedgerError::InvalidIndex);
        }
        let next = ray_mul(&self.hub.base_debt_index, growth, Rounding::Down)?;
        self.advance_base_debt_index(next)
    }

    /// Accrue linear interest at `rate_bps` per year for `elapsed_secs`
    pub fn accrue_linear(&mut self, rate_bps: u32, elapsed_secs: u64) -> Result<()> {
        let growth = linear_growth(rate_bps, elapsed_secs)?;
        self.accrue(&growth)
    }
}
