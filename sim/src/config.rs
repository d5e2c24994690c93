//! Scenario configuration
//!
//! Read from a TOML file named by the first CLI argument or the
//! `HUB_LEDGER_SIM_CONFIG` environment variable.

use std::path::Path;

use anyhow::{bail, Context, Result};
use fixed_point::{parse_ray, ray};
use hub_ledger::LedgerParams;
use num_bigint::BigUint;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "HUB_LEDGER_SIM_CONFIG";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// RNG seed; a run is fully reproducible from it
    pub seed: u64,
    pub num_spokes: usize,
    pub num_users: usize,
    /// Number of random operations
    pub depth: usize,
    /// Chance per step that the base-debt index grows before the operation
    pub skip_chance: f64,
    /// Chance per step that every user repays everything
    pub repay_all_chance: f64,
    /// Chance per step that every user withdraws everything
    pub withdraw_all_chance: f64,
    /// Smallest index growth factor per skip, decimal (1 = no growth)
    pub min_index_growth: String,
    /// Largest index growth factor per skip, decimal
    pub max_index_growth: String,
    /// Progress log interval in steps (0 disables)
    pub log_every: usize,
    pub ledger: LedgerParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            seed: 0x2545_F491_4F6C_DD1D,
            num_spokes: 10,
            num_users: 300,
            depth: 1_000,
            skip_chance: 0.8,
            repay_all_chance: 0.02,
            withdraw_all_chance: 0.02,
            min_index_growth: "1".to_string(),
            max_index_growth: "1.001".to_string(),
            log_every: 100,
            ledger: LedgerParams::default(),
        }
    }
}

impl SimConfig {
    /// Load from `path`, or from `$HUB_LEDGER_SIM_CONFIG`, falling back to defaults
    pub fn load(path: Option<String>) -> Result<SimConfig> {
        let path = path.or_else(|| std::env::var(CONFIG_ENV).ok());
        let config = match path {
            Some(path) if Path::new(&path).exists() => Self::from_file(&path)?,
            Some(path) => {
                log::warn!("Config {} not found, using defaults", path);
                SimConfig::default()
            }
            None => SimConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<SimConfig> {
        let text =
            std::fs::read_to_string(path).context(format!("Failed to read config {}", path))?;
        Self::from_toml(&text).context(format!("Failed to parse config {}", path))
    }

    pub fn from_toml(text: &str) -> Result<SimConfig> {
        Ok(toml::from_str(text)?)
    }

    /// Index growth bounds, ray-scaled
    pub fn index_growth(&self) -> Result<(BigUint, BigUint)> {
        let min = parse_ray(&self.min_index_growth)
            .context(format!("Invalid min_index_growth {:?}", self.min_index_growth))?;
        let max = parse_ray(&self.max_index_growth)
            .context(format!("Invalid max_index_growth {:?}", self.max_index_growth))?;
        Ok((min, max))
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_spokes == 0 || self.num_users == 0 {
            bail!("num_spokes and num_users must be positive");
        }
        for (name, chance) in [
            ("skip_chance", self.skip_chance),
            ("repay_all_chance", self.repay_all_chance),
            ("withdraw_all_chance", self.withdraw_all_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                bail!("{} must be within [0, 1], got {}", name, chance);
            }
        }
        let (min, max) = self.index_growth()?;
        if min < ray() || max < min {
            bail!(
                "index growth must satisfy 1 <= min <= max, got {} and {}",
                self.min_index_growth,
                self.max_index_growth
            );
        }
        if self.ledger.min_risk_premium > self.ledger.max_risk_premium {
            bail!("ledger.min_risk_premium exceeds ledger.max_risk_premium");
        }
        if self.ledger.liquidity_fee > fixed_point::PERCENTAGE_FACTOR {
            bail!("ledger.liquidity_fee must be at most 10000 bps, got {}", self.ledger.liquidity_fee);
        }
        Ok(())
    }
}
