//! Share-based Lending Ledger with Per-Account Risk Premium
//!
//! This crate implements a three-tier lending ledger:
//!
//! - **Hub** (root): owns the base-debt index, the pool's available
//!   liquidity, a registry of spokes and the sum of every user's ledger fields
//! - **Spoke** (partition): holds the sum of its users' ledger fields; the hub
//!   keeps a mirror of each spoke's fields that must match exactly
//! - **User** (account): supplies, withdraws, borrows and repays, and carries
//!   its own risk-premium rate
//!
//! It guarantees that:
//! 1. Every ledger field on every entity stays within [0, MAX_UINT]
//! 2. Spoke and hub fields are exact sums of their children
//! 3. The hub's mirror of a spoke equals the spoke's own fields after every operation
//! 4. Each user accrues premium at its own rate without touching any other user
//!    (ghost shares + offset, O(1) per operation)
//! 5. Every operation is all-or-nothing across user, spoke, hub mirror and hub
//!
//! ## Premium accrual
//!
//! ```text
//! premium_debt_ray = unrealised_premium + ghost_drawn_shares * base_debt_index - offset
//! premium_debt     = ceil(premium_debt_ray / RAY)
//! ```
//!
//! On every principal or rate change the accrued part is folded into
//! `unrealised_premium` and `offset` is re-anchored at the current ghost value.
//! Because the expression is linear in the stored fields, hub and spoke sums
//! price the premium of all their users at once.
//!
//! ## Supply side
//!
//! Supplied shares are priced against the pool (liquidity plus all debt) with
//! `VIRTUAL_ASSETS` / `VIRTUAL_SHARES` added to both totals. An optional
//! `liquidity_fee` takes a cut of every index advancement's interest and mints
//! it as supplied shares to the ledger's fee receiver.

#![forbid(unsafe_code)]

use num_bigint::BigUint;
use num_traits::One;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// Lowest accepted risk premium (basis points)
pub const MIN_RISK_PREMIUM: u32 = 0;

/// Highest accepted risk premium (basis points, 1000%)
pub const MAX_RISK_PREMIUM: u32 = 1000_00;

/// Max absolute rounding difference tolerated between a tier and the sum of its children
pub const DUST: u32 = 3;

/// Shares added to the supplied-share total when pricing the supply side
pub const VIRTUAL_SHARES: u32 = 1_000_000;

/// Assets added to the pool total when pricing the supply side
///
/// Together with `VIRTUAL_SHARES` this keeps the supply index defined for an
/// empty pool and leaves any residue of a drained pool to virtual holders.
pub const VIRTUAL_ASSETS: u32 = 1_000_000;

/// Seconds in a (365 day) year, used by linear index growth
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Largest representable quantity (2^256 - 1)
///
/// Also the "everything" sentinel for `repay` and `withdraw`.
pub fn max_uint() -> BigUint {
    (BigUint::one() << 256u32) - BigUint::one()
}

// ============================================================================
// Modules
// ============================================================================

pub mod hub;
pub mod index;
pub mod invariants;
pub mod ops;
pub mod position;
pub mod premium;
pub mod shared;

pub use fixed_point::{format_ether, parse_ether, ray, Rounding};
pub use hub::{Debt, Entity, Hub, Ledger, PositionState, Spoke, SpokeEntry, SpokeId, User, UserId};
pub use invariants::{check_all, InvariantViolation};
pub use position::{Field, LedgerDelta, LedgerFields};
pub use shared::SharedLedger;

// ============================================================================
// Parameters
// ============================================================================

/// Ledger-wide parameters
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Lowest risk premium a user may select (bps)
    pub min_risk_premium: u32,
    /// Highest risk premium a user may select (bps)
    pub max_risk_premium: u32,
    /// Rounding tolerance for tier reconciliation checks (smallest units)
    pub dust: u32,
    /// Share of accrued interest minted to the fee receiver (bps)
    pub liquidity_fee: u32,
}

impl Default for LedgerParams {
    fn default() -> Self {
        LedgerParams {
            min_risk_premium: MIN_RISK_PREMIUM,
            max_risk_premium: MAX_RISK_PREMIUM,
            dust: DUST,
            liquidity_fee: 0,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Operation errors. Every error leaves the ledger untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Zero or out-of-range amount, or an amount that converts to zero shares
    #[error("invalid amount")]
    InvalidAmount,

    /// Withdrawal exceeds the user's convertible supplied balance
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Borrow/withdraw would exceed the pool's unborrowed assets
    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    /// Risk premium outside [min_risk_premium, max_risk_premium]
    #[error("risk premium {0} bps out of bounds")]
    InvalidRate(u32),

    /// Liquidity fee above 100%
    #[error("liquidity fee {0} bps out of bounds")]
    InvalidFee(u32),

    /// Index advancement that would move the index backwards
    #[error("invalid index")]
    InvalidIndex,

    /// Arithmetic precondition violated (internal consistency fault)
    #[error("division by zero")]
    DivisionByZero,

    /// A ledger field would exceed MAX_UINT
    #[error("arithmetic overflow")]
    Overflow,

    /// A ledger field would become negative
    #[error("arithmetic underflow")]
    Underflow,

    #[error("spoke {0} not found")]
    SpokeNotFound(usize),

    #[error("user {0} not found")]
    UserNotFound(usize),

    /// Operation on a user that has no spoke yet
    #[error("user {0} is not assigned to a spoke")]
    UserNotAssigned(usize),

    /// A user's spoke is assigned once and never changes
    #[error("user {0} is already assigned to a spoke")]
    SpokeAlreadyAssigned(usize),
}

impl From<fixed_point::MathError> for LedgerError {
    fn from(err: fixed_point::MathError) -> Self {
        match err {
            fixed_point::MathError::DivisionByZero => LedgerError::DivisionByZero,
            fixed_point::MathError::NoInverse(_) | fixed_point::MathError::InvalidDecimal(_) => {
                LedgerError::InvalidAmount
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests;
