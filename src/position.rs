//! Ledger fields shared by the hub, spokes, users and the hub's spoke mirrors
//!
//! All four carry the same five quantities. Mutation goes through
//! `LedgerDelta` so the same signed change can be staged against every level
//! before any of them is written.

use core::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;

use crate::{max_uint, LedgerError, Result};

/// One of the five ledger fields
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    SuppliedShares,
    BaseDrawnShares,
    GhostDrawnShares,
    /// Ray-scaled ghost value recorded at the last re-anchor
    Offset,
    /// Ray-scaled premium realised but not yet repaid
    UnrealisedPremium,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::SuppliedShares,
        Field::BaseDrawnShares,
        Field::GhostDrawnShares,
        Field::Offset,
        Field::UnrealisedPremium,
    ];

    /// The premium accumulator triple
    pub const PREMIUM: [Field; 3] = [
        Field::GhostDrawnShares,
        Field::Offset,
        Field::UnrealisedPremium,
    ];

    #[inline]
    const fn slot(self) -> usize {
        match self {
            Field::SuppliedShares => 0,
            Field::BaseDrawnShares => 1,
            Field::GhostDrawnShares => 2,
            Field::Offset => 3,
            Field::UnrealisedPremium => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Field::SuppliedShares => "supplied_shares",
            Field::BaseDrawnShares => "base_drawn_shares",
            Field::GhostDrawnShares => "ghost_drawn_shares",
            Field::Offset => "offset",
            Field::UnrealisedPremium => "unrealised_premium",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The five ledger fields
///
/// # Invariants
/// - Every field is within [0, MAX_UINT]
/// - `offset <= ghost_drawn_shares * base_debt_index` (index never decreases)
/// - On a spoke or the hub, each field is the exact sum of its children
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerFields {
    /// Claim on pooled supplied liquidity
    pub supplied_shares: BigUint,

    /// Claim on base debt, in base-debt-index units
    pub base_drawn_shares: BigUint,

    /// Base drawn shares scaled by the user's risk premium at the last re-anchor
    pub ghost_drawn_shares: BigUint,

    /// `ghost_drawn_shares * base_debt_index` at the last re-anchor (ray-scaled)
    pub offset: BigUint,

    /// Premium realised but not yet repaid (ray-scaled)
    pub unrealised_premium: BigUint,
}

impl LedgerFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &BigUint {
        match field {
            Field::SuppliedShares => &self.supplied_shares,
            Field::BaseDrawnShares => &self.base_drawn_shares,
            Field::GhostDrawnShares => &self.ghost_drawn_shares,
            Field::Offset => &self.offset,
            Field::UnrealisedPremium => &self.unrealised_premium,
        }
    }

    fn get_mut(&mut self, field: Field) -> &mut BigUint {
        match field {
            Field::SuppliedShares => &mut self.supplied_shares,
            Field::BaseDrawnShares => &mut self.base_drawn_shares,
            Field::GhostDrawnShares => &mut self.ghost_drawn_shares,
            Field::Offset => &mut self.offset,
            Field::UnrealisedPremium => &mut self.unrealised_premium,
        }
    }

    /// True when all five fields are zero
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|&f| self.get(f).is_zero())
    }

    /// True when every field fits in [0, MAX_UINT]
    pub fn within_bounds(&self) -> bool {
        let max = max_uint();
        Field::ALL.iter().all(|&f| self.get(f) <= &max)
    }

    /// Stage `self + delta` without mutating
    ///
    /// # Returns
    /// The new fields, `Underflow` if any field would go negative or
    /// `Overflow` if any would exceed MAX_UINT
    pub fn apply(&self, delta: &LedgerDelta) -> Result<LedgerFields> {
        let max = max_uint();
        let mut next = self.clone();

        for field in Field::ALL {
            let change = delta.get(field);
            if change.is_zero() {
                continue;
            }
            let value = BigInt::from(self.get(field).clone()) + change;
            let value = value.to_biguint().ok_or(LedgerError::Underflow)?;
            if value > max {
                return Err(LedgerError::Overflow);
            }
            *next.get_mut(field) = value;
        }

        Ok(next)
    }
}

/// Signed change to each of the five ledger fields
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerDelta([BigInt; 5]);

impl LedgerDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> &BigInt {
        &self.0[field.slot()]
    }

    /// Add `amount` to the change recorded for `field`
    pub fn add(&mut self, field: Field, amount: BigInt) {
        self.0[field.slot()] += amount;
    }

    pub fn increase(&mut self, field: Field, amount: &BigUint) {
        self.add(field, BigInt::from(amount.clone()));
    }

    pub fn decrease(&mut self, field: Field, amount: &BigUint) {
        self.add(field, BigInt::from_biguint(Sign::Minus, amount.clone()));
    }

    /// Record the move of `field` from `from` to `to`
    pub fn set_change(&mut self, field: Field, from: &BigUint, to: &BigUint) {
        self.add(field, BigInt::from(to.clone()) - BigInt::from(from.clone()));
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|d| d.is_zero())
    }
}
