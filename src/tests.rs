use super::*;
use num_traits::Zero;

fn ether(s: &str) -> BigUint {
    parse_ether(s).unwrap()
}

/// One spoke, a supplier with 10_000 ether and a borrower
fn pool() -> (Ledger, UserId, UserId) {
    let mut ledger = Ledger::default();
    let spoke = ledger.add_spoke();
    let supplier = ledger.add_user_to(spoke).unwrap();
    let borrower = ledger.add_user_to(spoke).unwrap();
    ledger.supply(supplier, &ether("10000")).unwrap();
    (ledger, supplier, borrower)
}

fn mirror(ledger: &Ledger, spoke: SpokeId) -> &LedgerFields {
    ledger.hub.get_spoke(spoke).unwrap()
}

fn assert_unchanged(before: &Ledger, after: &Ledger) {
    assert_eq!(before.hub.fields, after.hub.fields);
    assert_eq!(before.hub.available_liquidity, after.hub.available_liquidity);
    assert_eq!(before.hub.spokes, after.hub.spokes);
    for (a, b) in before.spokes.iter().zip(after.spokes.iter()) {
        assert_eq!(a.fields, b.fields);
    }
    for (a, b) in before.users.iter().zip(after.users.iter()) {
        assert_eq!(a.fields, b.fields);
        assert_eq!(a.risk_premium, b.risk_premium);
    }
}

#[test]
fn test_commit_updates_all_four_levels() {
    let (mut ledger, _, borrower) = pool();
    ledger.update_risk_premium(borrower, 2_500).unwrap();
    ledger.borrow(borrower, &ether("100")).unwrap();

    let spoke = ledger.users[borrower.0].spoke.unwrap();
    assert_eq!(&ledger.spokes[spoke.0].fields, mirror(&ledger, spoke));
    assert_eq!(ledger.hub.fields, ledger.spokes[spoke.0].fields);
    // borrower shares 100 at index 1, ghost 25%
    assert_eq!(ledger.users[borrower.0].fields.base_drawn_shares, ether("100"));
    assert_eq!(ledger.users[borrower.0].fields.ghost_drawn_shares, ether("25"));
    assert_eq!(ledger.hub.available_liquidity, ether("9900"));
}

#[test]
fn test_mirror_tracks_each_spoke_separately() {
    let mut ledger = Ledger::default();
    let a = ledger.add_spoke();
    let b = ledger.add_spoke();
    let ua = ledger.add_user_to(a).unwrap();
    let ub = ledger.add_user_to(b).unwrap();

    ledger.supply(ua, &ether("50")).unwrap();
    ledger.supply(ub, &ether("70")).unwrap();
    ledger.borrow(ub, &ether("20")).unwrap();

    assert_eq!(mirror(&ledger, a).supplied_shares, ether("50"));
    assert!(mirror(&ledger, a).base_drawn_shares.is_zero());
    assert_eq!(mirror(&ledger, b).supplied_shares, ether("70"));
    assert_eq!(mirror(&ledger, b).base_drawn_shares, ether("20"));
    assert_eq!(ledger.hub.fields.supplied_shares, ether("120"));
    assert_eq!(check_all(&ledger), Ok(()));
}

#[test]
fn test_failed_commit_writes_nothing() {
    let (mut ledger, supplier, _) = pool();
    // Push the hub's premium accumulator to the edge so any increase overflows
    ledger.users[supplier.0].fields.unrealised_premium = max_uint();
    let spoke = ledger.users[supplier.0].spoke.unwrap();
    let before = ledger.clone();

    let mut delta = LedgerDelta::new();
    delta.increase(Field::SuppliedShares, &BigUint::from(1u32));
    delta.increase(Field::UnrealisedPremium, &BigUint::from(1u32));
    let liquidity = ledger.hub.available_liquidity.clone() + 1u32;

    assert_eq!(
        ledger.commit(supplier, &delta, liquidity),
        Err(LedgerError::Overflow)
    );
    assert_unchanged(&before, &ledger);
    assert_eq!(&before.spokes[spoke.0].fields, &ledger.spokes[spoke.0].fields);
}

#[test]
fn test_rejected_operations_leave_state_untouched() {
    let (mut ledger, supplier, borrower) = pool();
    ledger.borrow(borrower, &ether("1000")).unwrap();
    let before = ledger.clone();

    assert_eq!(
        ledger.withdraw(supplier, &ether("10001")),
        Err(LedgerError::InsufficientBalance)
    );
    assert_eq!(
        ledger.borrow(borrower, &ether("9001")),
        Err(LedgerError::InsufficientLiquidity)
    );
    assert_eq!(
        ledger.update_risk_premium(borrower, MAX_RISK_PREMIUM + 1),
        Err(LedgerError::InvalidRate(MAX_RISK_PREMIUM + 1))
    );
    assert_eq!(
        ledger.supply(supplier, &BigUint::zero()),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        ledger.repay(supplier, &ether("1")),
        Err(LedgerError::InvalidAmount)
    );
    assert_unchanged(&before, &ledger);
}

#[test]
fn test_assignment_rules() {
    let mut ledger = Ledger::default();
    let a = ledger.add_spoke();
    let b = ledger.add_spoke();
    let user = ledger.add_user();

    assert_eq!(
        ledger.supply(user, &ether("1")),
        Err(LedgerError::UserNotAssigned(user.0))
    );
    assert_eq!(
        ledger.assign_spoke(user, SpokeId(9)),
        Err(LedgerError::SpokeNotFound(9))
    );

    ledger.assign_spoke(user, a).unwrap();
    assert_eq!(
        ledger.assign_spoke(user, b),
        Err(LedgerError::SpokeAlreadyAssigned(user.0))
    );
    assert_eq!(ledger.users[user.0].spoke, Some(a));
    assert_eq!(ledger.spokes[a.0].users, vec![user]);
    assert!(ledger.spokes[b.0].users.is_empty());

    assert_eq!(
        ledger.borrow(UserId(42), &ether("1")),
        Err(LedgerError::UserNotFound(42))
    );
}

#[test]
fn test_last_shares_locked_while_debt_outstanding() {
    let (mut ledger, supplier, borrower) = pool();
    ledger.supply(borrower, &ether("1")).unwrap();
    ledger.borrow(borrower, &ether("1")).unwrap();
    ledger.withdraw(supplier, &max_uint()).unwrap();

    // The borrower now holds every supplied share and still owes
    assert_eq!(
        ledger.withdraw(borrower, &max_uint()),
        Err(LedgerError::InsufficientLiquidity)
    );

    ledger.repay(borrower, &max_uint()).unwrap();
    assert_eq!(ledger.withdraw(borrower, &max_uint()).unwrap(), ether("1"));
    assert!(ledger.hub.fields.is_empty());
    assert!(ledger.hub.available_liquidity.is_zero());
}

#[test]
fn test_repay_everything_without_debt_is_a_no_op() {
    let (mut ledger, supplier, borrower) = pool();
    let before = ledger.clone();

    assert_eq!(ledger.repay(supplier, &max_uint()).unwrap(), BigUint::zero());
    assert_eq!(ledger.repay(borrower, &max_uint()).unwrap(), BigUint::zero());
    assert_unchanged(&before, &ledger);

    // Only the sentinel is forgiven
    assert_eq!(
        ledger.repay(borrower, &BigUint::zero()),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        ledger.repay(borrower, &BigUint::from(1u32)),
        Err(LedgerError::InvalidAmount)
    );
}

#[test]
fn test_drained_pool_residue_stays_with_virtual_shares() {
    let mut ledger = Ledger::default();
    let spoke = ledger.add_spoke();
    let first = ledger.add_user_to(spoke).unwrap();
    let second = ledger.add_user_to(spoke).unwrap();

    ledger.supply(first, &BigUint::from(2u32)).unwrap();
    ledger.borrow(first, &BigUint::from(1u32)).unwrap();
    ledger.accrue(&(ray() * 2u32)).unwrap();
    ledger.repay(first, &max_uint()).unwrap();

    // Three assets back two shares; withdrawing two burns them all
    assert_eq!(ledger.withdraw(first, &BigUint::from(2u32)).unwrap(), BigUint::from(2u32));
    assert!(ledger.hub.fields.supplied_shares.is_zero());
    assert_eq!(ledger.hub.available_liquidity, BigUint::from(1u32));
    let index = ledger.hub.supply_index().unwrap();
    assert!(index > ray());

    // The leftover wei is not handed to the next supplier
    assert_eq!(
        ledger.supply(second, &BigUint::from(1u32)),
        Err(LedgerError::InvalidAmount)
    );
    let amount = BigUint::from(1_000_000u32);
    ledger.supply(second, &amount).unwrap();
    assert!(ledger.get_supplied_balance(Entity::User(second)).unwrap() <= amount);
    assert!(ledger.hub.supply_index().unwrap() >= index);
    assert_eq!(check_all(&ledger), Ok(()));
}

#[test]
fn test_borrow_needs_supplied_shares() {
    let mut ledger = Ledger::default();
    let spoke = ledger.add_spoke();
    let user = ledger.add_user_to(spoke).unwrap();
    assert_eq!(
        ledger.borrow(user, &BigUint::from(1u32)),
        Err(LedgerError::InsufficientLiquidity)
    );
}

#[test]
fn test_rate_update_is_stored_after_commit() {
    let (mut ledger, _, borrower) = pool();
    ledger.borrow(borrower, &ether("400")).unwrap();
    ledger.update_risk_premium(borrower, 5_000).unwrap();

    assert_eq!(ledger.users[borrower.0].risk_premium, 5_000);
    assert_eq!(
        ledger.users[borrower.0].fields.ghost_drawn_shares,
        ether("200")
    );
    assert_eq!(
        ledger.users[borrower.0].fields.offset,
        ether("200") * ray()
    );
}

#[test]
fn test_params_from_toml_fill_defaults() {
    let params: LedgerParams = toml::from_str("max_risk_premium = 5000").unwrap();
    assert_eq!(params.max_risk_premium, 5_000);
    assert_eq!(params.min_risk_premium, MIN_RISK_PREMIUM);
    assert_eq!(params.dust, DUST);
    assert_eq!(params.liquidity_fee, 0);

    let mut ledger = Ledger::new(params);
    let spoke = ledger.add_spoke();
    let user = ledger.add_user_to(spoke).unwrap();
    assert_eq!(
        ledger.update_risk_premium(user, 5_001),
        Err(LedgerError::InvalidRate(5_001))
    );
}
