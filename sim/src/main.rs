//! Hub Ledger Scenario Driver
//!
//! Drives a ledger with random supply, withdraw, borrow, repay and
//! risk-premium operations across many spokes and users, checks every
//! invariant after each step, then unwinds every position and requires the
//! ledger to end at zero.

mod config;

use anyhow::{bail, Context, Result};
use config::SimConfig;
use hub_ledger::{check_all, format_ether, max_uint, Entity, Ledger, LedgerError, UserId};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

#[derive(Debug, Default)]
struct Stats {
    applied: usize,
    rejected: usize,
    accruals: usize,
}

struct Simulation {
    config: SimConfig,
    ledger: Ledger,
    users: Vec<UserId>,
    rng: XorShiftRng,
    growth: (BigUint, BigUint),
    stats: Stats,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting hub ledger scenario");

    let config = SimConfig::load(std::env::args().nth(1))?;
    log::info!(
        "seed={} spokes={} users={} depth={}",
        config.seed,
        config.num_spokes,
        config.num_users,
        config.depth
    );

    let mut sim = Simulation::new(config)?;
    sim.run()?;
    sim.unwind()?;

    log::info!(
        "ran {} steps: {} applied, {} rejected, {} accruals",
        sim.config.depth,
        sim.stats.applied,
        sim.stats.rejected,
        sim.stats.accruals
    );
    Ok(())
}

/// Errors an operation may legitimately return for a random request
fn is_rejection(err: &LedgerError) -> bool {
    matches!(
        err,
        LedgerError::InvalidAmount
            | LedgerError::InsufficientBalance
            | LedgerError::InsufficientLiquidity
    )
}

impl Simulation {
    fn new(config: SimConfig) -> Result<Self> {
        let growth = config.index_growth()?;
        let mut rng = XorShiftRng::seed_from_u64(config.seed);
        let mut ledger = Ledger::new(config.ledger.clone());

        let spokes: Vec<_> = (0..config.num_spokes).map(|_| ledger.add_spoke()).collect();
        let users = (0..config.num_users)
            .map(|_| {
                let spoke = spokes[rng.gen_range(0..spokes.len())];
                ledger.add_user_to(spoke)
            })
            .collect::<hub_ledger::Result<Vec<_>>>()?;
        if config.ledger.liquidity_fee > 0 {
            ledger.set_fee_receiver(users[0])?;
            log::info!("liquidity fee {} bps to user {}", config.ledger.liquidity_fee, users[0].0);
        }

        Ok(Simulation {
            config,
            ledger,
            users,
            rng,
            growth,
            stats: Stats::default(),
        })
    }

    /// Random amount in wei spanning dust to ~1e10 ether
    fn random_amount(&mut self) -> BigUint {
        if self.rng.gen_bool(0.15) {
            return BigUint::from(self.rng.gen_range(1u32..10));
        }
        let magnitude = self.rng.gen_range(0u32..=10);
        let whole = self.rng.gen_range(0u128..=10u128.pow(magnitude));
        let decimals = self.rng.gen_range(0u32..=18);
        let fraction = self.rng.gen_range(1u128..=10u128.pow(decimals));
        BigUint::from(whole * 10u128.pow(decimals) + fraction)
    }

    /// Uniform-ish value in [1, max]
    fn random_up_to(&mut self, max: &BigUint) -> BigUint {
        if max.is_zero() {
            return BigUint::zero();
        }
        BigUint::from(self.rng.gen::<u128>()) % max + 1u32
    }

    fn accrue(&mut self) -> Result<()> {
        let (min, max) = &self.growth;
        let span = max - min + 1u32;
        let growth = min + BigUint::from(self.rng.gen::<u128>()) % span;
        self.ledger
            .accrue(&growth)
            .context("Index accrual failed")?;
        self.stats.accruals += 1;
        Ok(())
    }

    /// Count an operation outcome; anything but a plain rejection is fatal
    fn record<T>(&mut self, what: &str, user: UserId, result: hub_ledger::Result<T>) -> Result<()> {
        match result {
            Ok(_) => self.stats.applied += 1,
            Err(e) if is_rejection(&e) => {
                log::trace!("{} user={} rejected: {}", what, user.0, e);
                self.stats.rejected += 1;
            }
            Err(e) => bail!("{} for user {} failed: {}", what, user.0, e),
        }
        Ok(())
    }

    fn check(&self, step: usize) -> Result<()> {
        check_all(&self.ledger).context(format!("Invariant violated at step {}", step))
    }

    fn repay_all(&mut self) -> Result<()> {
        for i in 0..self.users.len() {
            let user = self.users[i];
            self.ledger
                .repay(user, &max_uint())
                .context(format!("Full repay for user {} failed", user.0))?;
        }
        Ok(())
    }

    fn withdraw_all(&mut self) -> Result<()> {
        for i in 0..self.users.len() {
            let user = self.users[i];
            if self.ledger.user(user)?.fields().supplied_shares.is_zero() {
                continue;
            }
            let result = self.ledger.withdraw(user, &max_uint());
            self.record("withdraw all", user, result)?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        let user = self.users[self.rng.gen_range(0..self.users.len())];
        let mut amount = self.random_amount();

        match self.rng.gen_range(0..5) {
            0 => {
                let result = self.ledger.supply(user, &amount);
                self.record("supply", user, result)?;
            }
            1 => {
                let balance = self.ledger.get_supplied_balance(Entity::User(user))?;
                if balance.is_zero() {
                    let result = self.ledger.supply(user, &amount);
                    self.record("supply", user, result)?;
                } else if amount > balance {
                    amount = self.random_up_to(&balance);
                }
                let result = self.ledger.withdraw(user, &amount);
                self.record("withdraw", user, result)?;
            }
            2 => {
                let liquidity = self.ledger.hub().available_liquidity().clone();
                if amount > liquidity {
                    if liquidity < BigUint::from(10u64.pow(18)) {
                        let result = self.ledger.supply(user, &amount);
                        self.record("supply", user, result)?;
                    } else {
                        amount = self.random_up_to(&liquidity);
                    }
                }
                let result = self.ledger.borrow(user, &amount);
                self.record("borrow", user, result)?;
            }
            3 => {
                let mut debt = self.ledger.get_total_debt(Entity::User(user))?;
                if debt.is_zero() {
                    let supplied = self.ledger.supply(user, &amount);
                    self.record("supply", user, supplied)?;
                    let borrowed = self.ledger.borrow(user, &amount);
                    self.record("borrow", user, borrowed)?;
                    if self.rng.gen_bool(0.5) {
                        self.accrue()?;
                    }
                    debt = self.ledger.get_total_debt(Entity::User(user))?;
                }
                amount = self.random_up_to(&debt);
                let result = self.ledger.repay(user, &amount);
                self.record("repay", user, result)?;
            }
            _ => {
                let params = self.ledger.params();
                let rp = self
                    .rng
                    .gen_range(params.min_risk_premium..=params.max_risk_premium);
                let result = self.ledger.update_risk_premium(user, rp);
                self.record("update risk premium", user, result)?;
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        for step in 0..self.config.depth {
            if self.rng.gen_bool(self.config.skip_chance) {
                self.accrue()?;
            }
            if self.rng.gen_bool(self.config.repay_all_chance) {
                self.repay_all()?;
                self.check(step)?;
            }
            if self.rng.gen_bool(self.config.withdraw_all_chance) {
                self.withdraw_all()?;
                self.check(step)?;
            }

            self.step()?;
            self.check(step)?;

            if self.config.log_every > 0 && (step + 1) % self.config.log_every == 0 {
                self.log_hub(step + 1)?;
            }
        }
        Ok(())
    }

    /// Repay and withdraw everything; every field at every tier must reach zero
    fn unwind(&mut self) -> Result<()> {
        self.repay_all()?;
        self.withdraw_all()?;
        self.check(self.config.depth)?;
        self.log_hub(self.config.depth)?;

        let ledger = &self.ledger;
        let dirty = std::iter::once(ledger.hub().fields())
            .chain(ledger.spokes().iter().map(|s| s.fields()))
            .chain(ledger.users().iter().map(|u| u.fields()))
            .filter(|f| !f.is_empty())
            .count();
        if dirty > 0 {
            bail!("{} entities still hold ledger state after unwinding", dirty);
        }

        log::info!("Unwound to zero; all invariants hold");
        Ok(())
    }

    fn log_hub(&self, step: usize) -> Result<()> {
        let hub = self.ledger.hub();
        let debt = hub.get_debt()?;
        log::info!(
            "step {}: liquidity={} base_debt={} premium_debt={} supply_index={} base_index={}",
            step,
            format_ether(hub.available_liquidity()),
            format_ether(&debt.base_debt),
            format_ether(&debt.premium_debt),
            fixed_point::format_ray(&hub.supply_index()?),
            fixed_point::format_ray(hub.base_debt_index())
        );
        Ok(())
    }
}
