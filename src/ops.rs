//! Supply, withdraw, borrow, repay and risk-premium updates
//!
//! Each operation validates, computes one `LedgerDelta` for the user and
//! commits it to the user, its spoke, the hub's mirror of that spoke and the
//! hub aggregate together. Errors leave every level untouched.

use num_bigint::BigUint;
use num_traits::Zero;

use fixed_point::{ray, Rounding};

use crate::hub::{Ledger, UserId};
use crate::position::{Field, LedgerDelta};
use crate::{max_uint, premium, LedgerError, Result};

impl Ledger {
    /// Supply `amount` assets to the pool
    ///
    /// # Returns
    /// Shares minted (rounded down)
    pub fn supply(&mut self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.spoke_of(user)?;
        if amount.is_zero() || amount > &max_uint() {
            return Err(LedgerError::InvalidAmount);
        }

        let shares = self.hub.to_supplied_shares(amount, Rounding::Down)?;
        if shares.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let mut delta = LedgerDelta::new();
        delta.increase(Field::SuppliedShares, &shares);
        let liquidity = &self.hub.available_liquidity + amount;
        self.commit(user, &delta, liquidity)?;

        log::debug!("supply user={} amount={} shares={}", user.0, amount, shares);
        Ok(shares)
    }

    /// Withdraw `amount` assets (`max_uint()` withdraws the full balance)
    ///
    /// # Returns
    /// Assets paid out
    pub fn withdraw(&mut self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.spoke_of(user)?;
        let held = self.users[user.0].fields.supplied_shares.clone();
        let balance = self.hub.to_supply_assets(&held)?;

        let (amount, burned) = if amount == &max_uint() {
            (balance.clone(), held.clone())
        } else {
            if amount > &balance {
                return Err(LedgerError::InsufficientBalance);
            }
            let burned = self.hub.to_supplied_shares(amount, Rounding::Up)?;
            (amount.clone(), burned)
        };

        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        if amount > self.hub.available_liquidity {
            return Err(LedgerError::InsufficientLiquidity);
        }
        if burned > held {
            return Err(LedgerError::InsufficientBalance);
        }
        // The last supplied shares cannot leave while debt is still backed by them
        if burned == self.hub.fields.supplied_shares && !self.hub.get_total_debt()?.is_zero() {
            return Err(LedgerError::InsufficientLiquidity);
        }

        let mut delta = LedgerDelta::new();
        delta.decrease(Field::SuppliedShares, &burned);
        let liquidity = &self.hub.available_liquidity - &amount;
        self.commit(user, &delta, liquidity)?;

        log::debug!("withdraw user={} amount={} shares={}", user.0, amount, burned);
        Ok(amount)
    }

    /// Borrow `amount` assets against the pool
    ///
    /// # Returns
    /// Base drawn shares minted (rounded up)
    pub fn borrow(&mut self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.spoke_of(user)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        if amount > &self.hub.available_liquidity || self.hub.fields.supplied_shares.is_zero() {
            return Err(LedgerError::InsufficientLiquidity);
        }

        let shares = self.hub.to_drawn_shares(amount, Rounding::Up)?;
        let u = &self.users[user.0];
        let new_base = &u.fields.base_drawn_shares + &shares;

        let mut delta = premium::realize_and_reanchor(
            &u.fields,
            &new_base,
            u.risk_premium,
            &self.hub.base_debt_index,
        )?;
        delta.increase(Field::BaseDrawnShares, &shares);
        let liquidity = &self.hub.available_liquidity - amount;
        self.commit(user, &delta, liquidity)?;

        log::debug!("borrow user={} amount={} shares={}", user.0, amount, shares);
        Ok(shares)
    }

    /// Repay up to `amount` (`max_uint()` repays everything outstanding)
    ///
    /// Premium is paid first, then base debt.
    ///
    /// # Returns
    /// Assets actually applied: `min(amount, total debt)`. With `max_uint()`
    /// and nothing owed this is zero and the ledger is unchanged.
    pub fn repay(&mut self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.spoke_of(user)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }

        let index = self.hub.base_debt_index.clone();
        let u = &self.users[user.0];
        let debt = self.hub.debt(&u.fields)?;
        let owed = debt.total();
        let effective = if amount < &owed { amount.clone() } else { owed };
        if effective.is_zero() {
            // "Repay everything" on a debt-free user has nothing to do
            if amount == &max_uint() {
                return Ok(effective);
            }
            return Err(LedgerError::InvalidAmount);
        }

        // Premium first
        let premium_ray = premium::premium_debt_ray(&u.fields, &index)?;
        let (premium_paid, premium_paid_ray) = if effective >= debt.premium_debt {
            (debt.premium_debt.clone(), premium_ray)
        } else {
            (effective.clone(), &effective * ray())
        };

        // Then base
        let base_paid = &effective - &premium_paid;
        let burned = if base_paid == debt.base_debt {
            u.fields.base_drawn_shares.clone()
        } else {
            self.hub.to_drawn_shares(&base_paid, Rounding::Down)?
        };
        if burned > u.fields.base_drawn_shares {
            return Err(LedgerError::Underflow);
        }
        let new_base = &u.fields.base_drawn_shares - &burned;

        let mut delta = premium::realize_and_reanchor(&u.fields, &new_base, u.risk_premium, &index)?;
        delta.decrease(Field::UnrealisedPremium, &premium_paid_ray);
        delta.decrease(Field::BaseDrawnShares, &burned);
        let liquidity = &self.hub.available_liquidity + &effective;
        self.commit(user, &delta, liquidity)?;

        log::debug!(
            "repay user={} amount={} premium={} base={} shares={}",
            user.0,
            effective,
            premium_paid,
            base_paid,
            burned
        );
        Ok(effective)
    }

    /// Change a user's risk premium (bps)
    ///
    /// Premium accrued under the old rate is realised first so no interest
    /// window is lost or double counted.
    pub fn update_risk_premium(&mut self, user: UserId, risk_premium: u32) -> Result<()> {
        self.spoke_of(user)?;
        if risk_premium < self.params.min_risk_premium || risk_premium > self.params.max_risk_premium
        {
            return Err(LedgerError::InvalidRate(risk_premium));
        }

        let u = &self.users[user.0];
        let delta = premium::realize_and_reanchor(
            &u.fields,
            &u.fields.base_drawn_shares,
            risk_premium,
            &self.hub.base_debt_index,
        )?;
        let liquidity = self.hub.available_liquidity.clone();
        self.commit(user, &delta, liquidity)?;
        self.users[user.0].risk_premium = risk_premium;

        log::debug!("risk premium user={} rp={}", user.0, risk_premium);
        Ok(())
    }
}
