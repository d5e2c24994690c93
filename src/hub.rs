//! Entity model: hub, spokes, users and the hub's spoke mirrors
//!
//! The `Ledger` owns every entity in insertion-ordered arenas addressed by
//! typed ids. Identity is stable: entities are never removed, a fully repaid
//! and withdrawn user simply has zero fields.

use num_bigint::BigUint;
use num_traits::Zero;

use fixed_point::ray;

use crate::position::{LedgerDelta, LedgerFields};
use crate::{max_uint, LedgerError, LedgerParams, Result};

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpokeId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub usize);

/// Any entity that carries ledger fields
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Hub,
    Spoke(SpokeId),
    User(UserId),
}

// ============================================================================
// Entities
// ============================================================================

/// Hub registry entry: the spoke id and the hub's copy of its fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpokeEntry {
    pub id: SpokeId,
    pub mirror: LedgerFields,
}

/// Root aggregator
///
/// # Invariants
/// - `base_debt_index >= RAY` and never decreases
/// - `fields` is the exact sum of every spoke's fields
/// - `spokes[i].mirror` equals spoke `spokes[i].id`'s own fields
#[derive(Clone, Debug)]
pub struct Hub {
    pub(crate) base_debt_index: BigUint,
    pub(crate) available_liquidity: BigUint,
    pub(crate) fields: LedgerFields,
    pub(crate) spokes: Vec<SpokeEntry>,
}

impl Hub {
    fn new() -> Self {
        Hub {
            base_debt_index: ray(),
            available_liquidity: BigUint::zero(),
            fields: LedgerFields::new(),
            spokes: Vec::new(),
        }
    }

    pub fn base_debt_index(&self) -> &BigUint {
        &self.base_debt_index
    }

    /// Supplied assets not currently lent out
    pub fn available_liquidity(&self) -> &BigUint {
        &self.available_liquidity
    }

    pub fn fields(&self) -> &LedgerFields {
        &self.fields
    }

    /// Spoke registry in registration order
    pub fn spokes(&self) -> &[SpokeEntry] {
        &self.spokes
    }

    /// Registry position of a spoke
    pub fn idx(&self, id: SpokeId) -> Option<usize> {
        self.spokes.iter().position(|entry| entry.id == id)
    }

    /// The hub's mirror of a spoke's fields
    pub fn get_spoke(&self, id: SpokeId) -> Option<&LedgerFields> {
        self.idx(id).map(|pos| &self.spokes[pos].mirror)
    }

    /// Registry entry at a position
    pub fn spoke_at(&self, position: usize) -> Option<&SpokeEntry> {
        self.spokes.get(position)
    }
}

/// Partition of users
#[derive(Clone, Debug)]
pub struct Spoke {
    pub(crate) id: SpokeId,
    pub(crate) fields: LedgerFields,
    pub(crate) users: Vec<UserId>,
}

impl Spoke {
    pub fn id(&self) -> SpokeId {
        self.id
    }

    pub fn fields(&self) -> &LedgerFields {
        &self.fields
    }

    /// Users assigned to this spoke, in assignment order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }
}

/// Which side(s) of the pool a user currently has exposure to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PositionState {
    NoPosition,
    Supplier,
    Borrower,
    SupplierBorrower,
}

/// Individual account
#[derive(Clone, Debug)]
pub struct User {
    pub(crate) id: UserId,
    pub(crate) spoke: Option<SpokeId>,
    pub(crate) risk_premium: u32,
    pub(crate) fields: LedgerFields,
}

impl User {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn spoke(&self) -> Option<SpokeId> {
        self.spoke
    }

    /// Current risk premium (bps)
    pub fn risk_premium(&self) -> u32 {
        self.risk_premium
    }

    pub fn fields(&self) -> &LedgerFields {
        &self.fields
    }

    pub fn position_state(&self) -> PositionState {
        let supplying = !self.fields.supplied_shares.is_zero();
        let borrowing = !self.fields.base_drawn_shares.is_zero();
        match (supplying, borrowing) {
            (false, false) => PositionState::NoPosition,
            (true, false) => PositionState::Supplier,
            (false, true) => PositionState::Borrower,
            (true, true) => PositionState::SupplierBorrower,
        }
    }
}

/// Base and premium debt in assets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Debt {
    pub base_debt: BigUint,
    pub premium_debt: BigUint,
}

impl Debt {
    pub fn total(&self) -> BigUint {
        &self.base_debt + &self.premium_debt
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// The whole three-tier state machine
#[derive(Clone, Debug)]
pub struct Ledger {
    pub(crate) params: LedgerParams,
    pub(crate) hub: Hub,
    pub(crate) spokes: Vec<Spoke>,
    pub(crate) users: Vec<User>,
    pub(crate) fee_receiver: Option<UserId>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerParams::default())
    }
}

impl Ledger {
    pub fn new(params: LedgerParams) -> Self {
        Ledger {
            params,
            hub: Hub::new(),
            spokes: Vec::new(),
            users: Vec::new(),
            fee_receiver: None,
        }
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn spokes(&self) -> &[Spoke] {
        &self.spokes
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn spoke(&self, id: SpokeId) -> Result<&Spoke> {
        self.spokes.get(id.0).ok_or(LedgerError::SpokeNotFound(id.0))
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(id.0).ok_or(LedgerError::UserNotFound(id.0))
    }

    /// Create a spoke and register it with the hub
    pub fn add_spoke(&mut self) -> SpokeId {
        let id = SpokeId(self.spokes.len());
        self.spokes.push(Spoke {
            id,
            fields: LedgerFields::new(),
            users: Vec::new(),
        });
        self.hub.spokes.push(SpokeEntry {
            id,
            mirror: LedgerFields::new(),
        });
        log::debug!("registered spoke {}", id.0);
        id
    }

    /// Create an unassigned user
    pub fn add_user(&mut self) -> UserId {
        let id = UserId(self.users.len());
        self.users.push(User {
            id,
            spoke: None,
            risk_premium: self.params.min_risk_premium,
            fields: LedgerFields::new(),
        });
        id
    }

    /// Assign a user to a spoke (once)
    pub fn assign_spoke(&mut self, user: UserId, spoke: SpokeId) -> Result<()> {
        self.spoke(spoke)?;
        let u = self.user(user)?;
        if u.spoke.is_some() {
            return Err(LedgerError::SpokeAlreadyAssigned(user.0));
        }

        self.users[user.0].spoke = Some(spoke);
        self.spokes[spoke.0].users.push(user);
        log::debug!("assigned user {} to spoke {}", user.0, spoke.0);
        Ok(())
    }

    /// User credited with liquidity fee shares on accrual
    pub fn fee_receiver(&self) -> Option<UserId> {
        self.fee_receiver
    }

    /// Route future liquidity fees to `user`
    ///
    /// Until a receiver is set, accrual takes no fee and all interest goes to
    /// suppliers.
    pub fn set_fee_receiver(&mut self, user: UserId) -> Result<()> {
        self.spoke_of(user)?;
        self.fee_receiver = Some(user);
        log::debug!("fee receiver user={}", user.0);
        Ok(())
    }

    /// Create a user and assign it in one step
    pub fn add_user_to(&mut self, spoke: SpokeId) -> Result<UserId> {
        self.spoke(spoke)?;
        let user = self.add_user();
        self.assign_spoke(user, spoke)?;
        Ok(user)
    }

    /// Ledger fields of any entity
    pub fn fields(&self, entity: Entity) -> Result<&LedgerFields> {
        match entity {
            Entity::Hub => Ok(&self.hub.fields),
            Entity::Spoke(id) => Ok(&self.spoke(id)?.fields),
            Entity::User(id) => Ok(&self.user(id)?.fields),
        }
    }

    /// Base and premium debt of any entity
    pub fn get_debt(&self, entity: Entity) -> Result<Debt> {
        self.hub.debt(self.fields(entity)?)
    }

    pub fn get_total_debt(&self, entity: Entity) -> Result<BigUint> {
        Ok(self.get_debt(entity)?.total())
    }

    /// Supplied shares of any entity converted to assets (rounded down)
    pub fn get_supplied_balance(&self, entity: Entity) -> Result<BigUint> {
        self.hub.to_supply_assets(&self.fields(entity)?.supplied_shares)
    }

    /// Spoke id of an assigned user
    pub(crate) fn spoke_of(&self, user: UserId) -> Result<SpokeId> {
        self.user(user)?
            .spoke
            .ok_or(LedgerError::UserNotAssigned(user.0))
    }

    /// Apply `delta` to a user, its spoke, the hub's mirror of that spoke and
    /// the hub aggregate, and set the hub's available liquidity
    ///
    /// Every new value is computed first; nothing is written unless all of
    /// them are in range.
    pub(crate) fn commit(
        &mut self,
        user: UserId,
        delta: &LedgerDelta,
        available_liquidity: BigUint,
    ) -> Result<()> {
        let spoke = self.spoke_of(user)?;
        let position = self.hub.idx(spoke).ok_or(LedgerError::SpokeNotFound(spoke.0))?;

        let user_fields = self.users[user.0].fields.apply(delta)?;
        let spoke_fields = self.spoke(spoke)?.fields.apply(delta)?;
        let mirror_fields = self.hub.spokes[position].mirror.apply(delta)?;
        let hub_fields = self.hub.fields.apply(delta)?;
        if available_liquidity > max_uint() {
            return Err(LedgerError::Overflow);
        }

        self.users[user.0].fields = user_fields;
        self.spokes[spoke.0].fields = spoke_fields;
        self.hub.spokes[position].mirror = mirror_fields;
        self.hub.fields = hub_fields;
        self.hub.available_liquidity = available_liquidity;
        Ok(())
    }
}
