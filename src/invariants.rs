//! Verification layer
//!
//! These checks are not part of normal error handling: a violation means the
//! ledger itself is wrong, and callers (tests, the scenario driver) should
//! stop. They scan every entity, so they are O(users).
//!
//! ## Tolerances
//!
//! Ledger fields move by identical deltas at every level, so field sums are
//! compared against `dust`. Asset amounts are derived per entity with one
//! upward rounding for base and one for premium debt, and one downward
//! rounding for supplied balance; sums over `n` children may therefore drift
//! by up to `n` per rounding from the parent's single conversion.

use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;

use crate::hub::{Debt, Entity, Ledger};
use crate::position::{Field, LedgerFields};
use crate::{format_ether, Result};

/// A broken ledger invariant
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{entity}.{field} out of bounds")]
    ValueOutOfBounds { entity: String, field: Field },

    #[error("spoke({spoke}).{field} {own} != hub mirror {mirror}")]
    MirrorMismatch {
        spoke: usize,
        field: Field,
        own: String,
        mirror: String,
    },

    #[error("{parent}.{field} {parent_value} vs children sum {children_value}")]
    FieldSumMismatch {
        parent: String,
        field: Field,
        parent_value: String,
        children_value: String,
    },

    #[error("{kind} debt of {parent} {parent_value} vs children sum {children_value}")]
    DebtSumMismatch {
        kind: &'static str,
        parent: String,
        parent_value: String,
        children_value: String,
    },

    #[error("{kind} dust remaining after hub debt was fully repaid: spokes {spokes}, users {users}")]
    StrandedDust {
        kind: &'static str,
        spokes: String,
        users: String,
    },

    #[error("{tier} total debt {debt} exceeds supplied assets {supplied}")]
    Insolvent {
        tier: &'static str,
        debt: String,
        supplied: String,
    },

    #[error("conversion failed while checking invariants: {0}")]
    Conversion(String),
}

pub type InvariantResult = core::result::Result<(), InvariantViolation>;

fn abs_diff(a: &BigUint, b: &BigUint) -> BigUint {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn slack(dust: u32, children: usize) -> BigUint {
    BigUint::from(dust) + BigUint::from(children)
}

fn conv<T>(result: Result<T>) -> core::result::Result<T, InvariantViolation> {
    result.map_err(|e| InvariantViolation::Conversion(e.to_string()))
}

fn sum_field<'a>(fields: impl Iterator<Item = &'a LedgerFields>, field: Field) -> BigUint {
    fields.fold(BigUint::zero(), |acc, f| acc + f.get(field))
}

/// Run every invariant, stopping at the first violation
pub fn check_all(ledger: &Ledger) -> InvariantResult {
    values_within_bounds(ledger)?;
    hub_spoke_accounting(ledger)?;
    sum_of_fields(ledger)?;
    sum_of_base_debt(ledger)?;
    sum_of_premium_debt(ledger)?;
    solvency(ledger)?;
    Ok(())
}

/// Every field on every entity within [0, MAX_UINT]
pub fn values_within_bounds(ledger: &Ledger) -> InvariantResult {
    let mut all: Vec<(String, &LedgerFields)> = vec![("hub".to_string(), ledger.hub().fields())];
    for entry in ledger.hub().spokes() {
        all.push((format!("hub.spokes[{}]", entry.id.0), &entry.mirror));
    }
    for spoke in ledger.spokes() {
        all.push((format!("spoke({})", spoke.id().0), spoke.fields()));
    }
    for user in ledger.users() {
        all.push((format!("user({})", user.id().0), user.fields()));
    }

    let max = crate::max_uint();
    for (entity, fields) in all {
        for field in Field::ALL {
            if fields.get(field) > &max {
                return Err(InvariantViolation::ValueOutOfBounds { entity, field });
            }
        }
    }
    Ok(())
}

/// The hub's mirror of each spoke equals the spoke's own fields exactly
pub fn hub_spoke_accounting(ledger: &Ledger) -> InvariantResult {
    for spoke in ledger.spokes() {
        let mirror = ledger.hub().get_spoke(spoke.id()).ok_or_else(|| {
            InvariantViolation::Conversion(format!("spoke {} missing from hub", spoke.id().0))
        })?;
        for field in Field::ALL {
            if spoke.fields().get(field) != mirror.get(field) {
                return Err(InvariantViolation::MirrorMismatch {
                    spoke: spoke.id().0,
                    field,
                    own: spoke.fields().get(field).to_string(),
                    mirror: mirror.get(field).to_string(),
                });
            }
        }
    }
    Ok(())
}

/// |hub - sum(spokes)| and |spoke - sum(its users)| within dust, per field
pub fn sum_of_fields(ledger: &Ledger) -> InvariantResult {
    let dust = BigUint::from(ledger.params().dust);

    for field in Field::ALL {
        let hub_value = ledger.hub().fields().get(field);
        let spokes_value = sum_field(ledger.spokes().iter().map(|s| s.fields()), field);
        if abs_diff(hub_value, &spokes_value) > dust {
            return Err(InvariantViolation::FieldSumMismatch {
                parent: "hub".to_string(),
                field,
                parent_value: hub_value.to_string(),
                children_value: spokes_value.to_string(),
            });
        }

        for spoke in ledger.spokes() {
            let users_value = sum_field(
                spoke.users().iter().map(|id| ledger.users()[id.0].fields()),
                field,
            );
            let spoke_value = spoke.fields().get(field);
            if abs_diff(spoke_value, &users_value) > dust {
                return Err(InvariantViolation::FieldSumMismatch {
                    parent: format!("spoke({})", spoke.id().0),
                    field,
                    parent_value: spoke_value.to_string(),
                    children_value: users_value.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Base debt sums agree across tiers; zero hub base debt leaves no dust
pub fn sum_of_base_debt(ledger: &Ledger) -> InvariantResult {
    sum_of_debt(ledger, "base", |d| &d.base_debt)
}

/// Premium debt sums agree across tiers; zero hub premium debt leaves no dust
pub fn sum_of_premium_debt(ledger: &Ledger) -> InvariantResult {
    sum_of_debt(ledger, "premium", |d| &d.premium_debt)
}

fn sum_of_debt(
    ledger: &Ledger,
    kind: &'static str,
    pick: fn(&Debt) -> &BigUint,
) -> InvariantResult {
    let dust = ledger.params().dust;
    let hub = conv(ledger.get_debt(Entity::Hub))?;
    let hub_value = pick(&hub);

    // Only children holding this kind of debt contribute a rounding
    let (mut spokes_value, mut spokes_owing) = (BigUint::zero(), 0);
    for spoke in ledger.spokes() {
        let debt = conv(ledger.get_debt(Entity::Spoke(spoke.id())))?;
        if !pick(&debt).is_zero() {
            spokes_value += pick(&debt);
            spokes_owing += 1;
        }
    }
    let (mut users_value, mut users_owing) = (BigUint::zero(), 0);
    for user in ledger.users() {
        let debt = conv(ledger.get_debt(Entity::User(user.id())))?;
        if !pick(&debt).is_zero() {
            users_value += pick(&debt);
            users_owing += 1;
        }
    }

    if abs_diff(hub_value, &spokes_value) > slack(dust, spokes_owing) {
        return Err(InvariantViolation::DebtSumMismatch {
            kind,
            parent: "hub".to_string(),
            parent_value: format_ether(hub_value),
            children_value: format_ether(&spokes_value),
        });
    }
    if abs_diff(&spokes_value, &users_value) > slack(dust, users_owing) {
        return Err(InvariantViolation::DebtSumMismatch {
            kind,
            parent: "spokes".to_string(),
            parent_value: format_ether(&spokes_value),
            children_value: format_ether(&users_value),
        });
    }
    if hub_value.is_zero() && !(spokes_value.is_zero() && users_value.is_zero()) {
        return Err(InvariantViolation::StrandedDust {
            kind,
            spokes: format_ether(&spokes_value),
            users: format_ether(&users_value),
        });
    }
    Ok(())
}

/// Total debt never exceeds total supplied assets, per tier
pub fn solvency(ledger: &Ledger) -> InvariantResult {
    let dust = ledger.params().dust;
    let hub = ledger.hub();

    let hub_debt = conv(hub.get_total_debt())?;
    let hub_supplied = conv(hub.total_supply_assets())?;
    if hub_debt > hub_supplied {
        return Err(InvariantViolation::Insolvent {
            tier: "hub",
            debt: format_ether(&hub_debt),
            supplied: format_ether(&hub_supplied),
        });
    }

    let tiers: [(&'static str, Vec<Entity>); 2] = [
        (
            "spokes",
            ledger
                .spokes()
                .iter()
                .filter(|s| !s.fields().is_empty())
                .map(|s| Entity::Spoke(s.id()))
                .collect(),
        ),
        (
            "users",
            ledger
                .users()
                .iter()
                .filter(|u| !u.fields().is_empty())
                .map(|u| Entity::User(u.id()))
                .collect(),
        ),
    ];

    for (tier, entities) in tiers {
        let mut debt = BigUint::zero();
        let mut supplied = BigUint::zero();
        for entity in &entities {
            debt += conv(ledger.get_total_debt(*entity))?;
            supplied += conv(ledger.get_supplied_balance(*entity))?;
        }
        // Each child rounds its balance down and both debt parts up, so a
        // tier can owe more than it holds even while the hub is solvent:
        // two borrowers of 1 wei at index 1.5 owe 2 each against a hub debt
        // of 3. The bound is therefore one rounding per part per position.
        let allowance = slack(dust, 3 * entities.len());
        if debt > &supplied + &allowance {
            return Err(InvariantViolation::Insolvent {
                tier,
                debt: format_ether(&debt),
                supplied: format_ether(&supplied),
            });
        }
    }
    Ok(())
}
