//! Fuzzing tests for the hub ledger
//! Run with: cargo test --test fuzzing
//!
//! proptest generates operation sequences and arithmetic inputs; a seeded
//! xorshift driver runs long multi-spoke scenarios that must unwind to zero.

use hub_ledger::invariants;
use hub_ledger::premium::{premium_debt_ray, realize_and_reanchor};
use hub_ledger::*;
use num_bigint::BigUint;
use num_traits::Zero;
use proptest::prelude::*;

const MAX_STEP_GROWTH_BPS: u64 = 200;

// xorshift64 PRNG for deterministic randomness
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn u64(&mut self, lo: u64, hi: u64) -> u64 {
        if lo >= hi {
            return lo;
        }
        lo + (self.next() % (hi - lo + 1))
    }

    fn usize(&mut self, lo: usize, hi: usize) -> usize {
        if lo >= hi {
            return lo;
        }
        lo + ((self.next() as usize) % (hi - lo + 1))
    }

    fn chance(&mut self, pct: u64) -> bool {
        self.u64(0, 99) < pct
    }
}

fn n(x: u128) -> BigUint {
    BigUint::from(x)
}

/// Amount in wei with 1e9 granularity so conversions actually round
fn amount(units: u64) -> BigUint {
    BigUint::from(units) * BigUint::from(1_000_000_007u64)
}

fn growth_from_bps(bps: u64) -> BigUint {
    ray() + ray() * BigUint::from(bps) / BigUint::from(10_000u32)
}

#[derive(Clone, Debug)]
enum Op {
    Supply(usize, u64),
    Withdraw(usize, u64),
    WithdrawAll(usize),
    Borrow(usize, u64),
    Repay(usize, u64),
    RepayAll(usize),
    Rate(usize, u32),
    Accrue(u64),
}

fn op_strategy(users: usize) -> impl Strategy<Value = Op> {
    let u = 0..users;
    prop_oneof![
        3 => (u.clone(), 1u64..1_000_000).prop_map(|(i, a)| Op::Supply(i, a)),
        2 => (u.clone(), 1u64..1_000_000).prop_map(|(i, a)| Op::Withdraw(i, a)),
        1 => u.clone().prop_map(Op::WithdrawAll),
        3 => (u.clone(), 1u64..500_000).prop_map(|(i, a)| Op::Borrow(i, a)),
        2 => (u.clone(), 1u64..500_000).prop_map(|(i, a)| Op::Repay(i, a)),
        1 => u.clone().prop_map(Op::RepayAll),
        1 => (u, 0u32..=MAX_RISK_PREMIUM).prop_map(|(i, r)| Op::Rate(i, r)),
        1 => (0u64..=MAX_STEP_GROWTH_BPS).prop_map(Op::Accrue),
    ]
}

fn run_op(ledger: &mut Ledger, users: &[UserId], op: &Op) {
    let _ = match *op {
        Op::Supply(i, a) => ledger.supply(users[i], &amount(a)).map(drop),
        Op::Withdraw(i, a) => ledger.withdraw(users[i], &amount(a)).map(drop),
        Op::WithdrawAll(i) => ledger.withdraw(users[i], &max_uint()).map(drop),
        Op::Borrow(i, a) => ledger.borrow(users[i], &amount(a)).map(drop),
        Op::Repay(i, a) => ledger.repay(users[i], &amount(a)).map(drop),
        Op::RepayAll(i) => ledger.repay(users[i], &max_uint()).map(drop),
        Op::Rate(i, r) => ledger.update_risk_premium(users[i], r),
        Op::Accrue(bps) => ledger.accrue(&growth_from_bps(bps)),
    };
}

fn setup(spokes: usize, users: usize) -> (Ledger, Vec<UserId>) {
    setup_with_fee(spokes, users, 0)
}

/// Ledger whose first user collects `fee_bps` of accrued interest
fn setup_with_fee(spokes: usize, users: usize, fee_bps: u32) -> (Ledger, Vec<UserId>) {
    let mut ledger = Ledger::new(LedgerParams {
        liquidity_fee: fee_bps,
        ..LedgerParams::default()
    });
    let ids: Vec<SpokeId> = (0..spokes).map(|_| ledger.add_spoke()).collect();
    let users: Vec<UserId> = (0..users)
        .map(|i| ledger.add_user_to(ids[i % spokes]).unwrap())
        .collect();
    if fee_bps > 0 {
        ledger.set_fee_receiver(users[0]).unwrap();
    }
    (ledger, users)
}

fn unwind(ledger: &mut Ledger, users: &[UserId]) {
    for &u in users {
        ledger.repay(u, &max_uint()).unwrap();
    }
    for &u in users {
        if !ledger.user(u).unwrap().fields().supplied_shares.is_zero() {
            ledger.withdraw(u, &max_uint()).unwrap();
        }
    }
}

fn assert_all_zero(ledger: &Ledger) {
    assert!(ledger.hub().fields().is_empty(), "hub: {:?}", ledger.hub().fields());
    for entry in ledger.hub().spokes() {
        assert!(entry.mirror.is_empty(), "mirror {}: {:?}", entry.id.0, entry.mirror);
    }
    for spoke in ledger.spokes() {
        assert!(spoke.fields().is_empty(), "spoke {}: {:?}", spoke.id().0, spoke.fields());
    }
    for user in ledger.users() {
        assert!(user.fields().is_empty(), "user {}: {:?}", user.id().0, user.fields());
    }
}

// Re-anchoring at an unchanged rate neither creates nor destroys premium
proptest! {
    #[test]
    fn fuzz_reanchor_conserves_premium(
        base in 0u128..1_000_000_000_000_000_000_000,
        rp in 0u32..=MAX_RISK_PREMIUM,
        unrealised in any::<u64>(),
        growth_bps in 0u64..50_000,
    ) {
        let start = growth_from_bps(0);
        let index = growth_from_bps(growth_bps);
        let ghost = fixed_point::percent_mul(&n(base), rp, Rounding::Up).unwrap();
        let fields = LedgerFields {
            base_drawn_shares: n(base),
            offset: &ghost * &start,
            ghost_drawn_shares: ghost,
            unrealised_premium: BigUint::from(unrealised),
            ..LedgerFields::new()
        };

        let before = premium_debt_ray(&fields, &index).unwrap();
        let delta = realize_and_reanchor(&fields, &fields.base_drawn_shares, rp, &index).unwrap();
        let after = fields.apply(&delta).unwrap();
        prop_assert_eq!(premium_debt_ray(&after, &index).unwrap(), before);
        prop_assert_eq!(after.ghost_drawn_shares, fields.ghost_drawn_shares);
    }
}

// Random operation sequences never break an invariant, and always unwind
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn fuzz_operation_sequences(
        ops in prop::collection::vec(op_strategy(6), 1..60),
        fee_bps in prop_oneof![Just(0u32), 1u32..=10_000],
    ) {
        let (mut ledger, users) = setup_with_fee(3, 6, fee_bps);

        for op in &ops {
            let supply_index = ledger.hub().supply_index().unwrap();

            run_op(&mut ledger, &users, op);
            prop_assert_eq!(invariants::check_all(&ledger), Ok(()), "after {:?}", op);
            prop_assert!(ledger.hub().supply_index().unwrap() >= supply_index, "{:?}", op);
        }

        unwind(&mut ledger, &users);
        prop_assert_eq!(invariants::check_all(&ledger), Ok(()));
        assert_all_zero(&ledger);
    }
}

// Minting the liquidity fee never lowers the price of a supplied share
proptest! {
    #[test]
    fn fuzz_fee_accrual_keeps_share_price(
        supplied in 1u64..1_000_000,
        borrowed_pct in 1u64..=100,
        rp in 0u32..=MAX_RISK_PREMIUM,
        fee_bps in 0u32..=10_000,
        steps in prop::collection::vec(0u64..=MAX_STEP_GROWTH_BPS, 1..10),
    ) {
        let (mut ledger, users) = setup_with_fee(1, 3, fee_bps);
        let (supplier, borrower) = (users[1], users[2]);

        ledger.supply(supplier, &amount(supplied)).unwrap();
        ledger.update_risk_premium(borrower, rp).unwrap();
        let borrow = (supplied * borrowed_pct / 100).max(1);
        ledger.borrow(borrower, &amount(borrow)).unwrap();

        for bps in steps {
            let price = ledger.hub().supply_index().unwrap();
            let receiver_before = ledger.user(users[0]).unwrap().fields().supplied_shares.clone();
            let next = fixed_point::ray_mul(
                ledger.hub().base_debt_index(),
                &growth_from_bps(bps),
                Rounding::Down,
            ).unwrap();
            let fee = ledger.hub().liquidity_fee(&next, ledger.params().liquidity_fee).unwrap();

            ledger.advance_base_debt_index(next).unwrap();
            prop_assert!(ledger.hub().supply_index().unwrap() >= price);

            // The receiver never ends up with more than the fee it was due
            let minted = &ledger.user(users[0]).unwrap().fields().supplied_shares - &receiver_before;
            prop_assert!(ledger.hub().to_supply_assets(&minted).unwrap() <= fee);
            prop_assert_eq!(invariants::check_all(&ledger), Ok(()));
        }
    }
}

// Failed operations leave every level byte-for-byte unchanged
proptest! {
    #[test]
    fn fuzz_errors_are_atomic(
        ops in prop::collection::vec(op_strategy(4), 1..30),
        last in op_strategy(4),
    ) {
        let (mut ledger, users) = setup(2, 4);
        for op in &ops {
            run_op(&mut ledger, &users, op);
        }

        let before = ledger.clone();
        let failed = match last {
            Op::Supply(i, a) => ledger.supply(users[i], &amount(a)).is_err(),
            Op::Withdraw(i, a) => ledger.withdraw(users[i], &amount(a)).is_err(),
            Op::WithdrawAll(i) => ledger.withdraw(users[i], &max_uint()).is_err(),
            Op::Borrow(i, a) => ledger.borrow(users[i], &amount(a)).is_err(),
            Op::Repay(i, a) => ledger.repay(users[i], &amount(a)).is_err(),
            Op::RepayAll(i) => ledger.repay(users[i], &max_uint()).is_err(),
            Op::Rate(i, r) => ledger.update_risk_premium(users[i], r).is_err(),
            Op::Accrue(bps) => ledger.accrue(&growth_from_bps(bps)).is_err(),
        };

        if failed {
            prop_assert_eq!(ledger.hub().fields(), before.hub().fields());
            prop_assert_eq!(ledger.hub().spokes(), before.hub().spokes());
            prop_assert_eq!(ledger.hub().available_liquidity(), before.hub().available_liquidity());
            prop_assert_eq!(ledger.hub().base_debt_index(), before.hub().base_debt_index());
            for (a, b) in ledger.users().iter().zip(before.users()) {
                prop_assert_eq!(a.fields(), b.fields());
                prop_assert_eq!(a.risk_premium(), b.risk_premium());
            }
        }
    }
}

/// Long seeded scenario across many spokes and users
fn run_scenario(seed: u64, spokes: usize, users: usize, steps: usize) {
    let mut rng = Rng::new(seed);
    let (mut ledger, ids) = setup(spokes, users);

    // Everyone supplies something so borrowing has a pool to draw from
    for &u in &ids {
        ledger.supply(u, &amount(rng.u64(1_000, 1_000_000))).unwrap();
    }

    for step in 0..steps {
        let u = ids[rng.usize(0, ids.len() - 1)];
        let op = match rng.u64(0, 7) {
            0 | 1 => Op::Supply(0, rng.u64(1, 1_000_000)),
            2 => {
                if rng.chance(20) {
                    Op::WithdrawAll(0)
                } else {
                    Op::Withdraw(0, rng.u64(1, 500_000))
                }
            }
            3 | 4 => Op::Borrow(0, rng.u64(1, 300_000)),
            5 => {
                if rng.chance(20) {
                    Op::RepayAll(0)
                } else {
                    Op::Repay(0, rng.u64(1, 300_000))
                }
            }
            6 => Op::Rate(0, rng.u64(0, MAX_RISK_PREMIUM as u64) as u32),
            _ => Op::Accrue(rng.u64(0, MAX_STEP_GROWTH_BPS)),
        };
        run_op(&mut ledger, &[u], &op);

        if let Err(violation) = invariants::check_all(&ledger) {
            panic!("seed {} step {} {:?}: {}", seed, step, op, violation);
        }
    }

    unwind(&mut ledger, &ids);
    assert_eq!(invariants::check_all(&ledger), Ok(()));
    assert_all_zero(&ledger);
}

#[test]
fn test_deterministic_scenarios_unwind_to_zero() {
    for seed in [0x2545_F491_4F6C_DD1D, 1, 42, 0xDEAD_BEEF, 7_777_777] {
        run_scenario(seed, 4, 16, 400);
    }
}

#[test]
fn test_deterministic_scenario_single_spoke_many_users() {
    run_scenario(0x9E37_79B9_7F4A_7C15, 1, 40, 600);
}
