//! Thread-safe handle to a ledger
//!
//! Operations take `&mut Ledger`, so a single lock around the whole ledger
//! serializes them. That is what keeps each operation atomic across the four
//! levels it touches when several threads drive the same ledger.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use num_bigint::BigUint;

use crate::hub::{Ledger, SpokeId, UserId};
use crate::invariants::{check_all, InvariantViolation};
use crate::{LedgerParams, Result};

#[derive(Clone, Debug, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(params: LedgerParams) -> Self {
        Self::from_ledger(Ledger::new(params))
    }

    pub fn from_ledger(ledger: Ledger) -> Self {
        SharedLedger {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    // A panic inside `with` cannot leave a half-written ledger: commit writes
    // only after every level was staged.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the ledger
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Ledger {
        self.lock().clone()
    }

    pub fn add_spoke(&self) -> SpokeId {
        self.with(|l| l.add_spoke())
    }

    pub fn add_user_to(&self, spoke: SpokeId) -> Result<UserId> {
        self.with(|l| l.add_user_to(spoke))
    }

    pub fn supply(&self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.with(|l| l.supply(user, amount))
    }

    pub fn withdraw(&self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.with(|l| l.withdraw(user, amount))
    }

    pub fn borrow(&self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.with(|l| l.borrow(user, amount))
    }

    pub fn repay(&self, user: UserId, amount: &BigUint) -> Result<BigUint> {
        self.with(|l| l.repay(user, amount))
    }

    pub fn update_risk_premium(&self, user: UserId, risk_premium: u32) -> Result<()> {
        self.with(|l| l.update_risk_premium(user, risk_premium))
    }

    pub fn accrue(&self, growth: &BigUint) -> Result<()> {
        self.with(|l| l.accrue(growth))
    }

    pub fn check_all(&self) -> core::result::Result<(), InvariantViolation> {
        self.with(|l| check_all(l))
    }
}
