//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. Every section has defaults, so
//! an empty file is valid. `FORESIGHT_ORACLE_URL` overrides the HTTP feed
//! URL.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::{ConsensusRule, Units};
use crate::error::{ConfigError, Result};
use crate::service::evaluator::EvaluatorsConfig;
use crate::service::RiskLimits;

/// Environment variable overriding `[oracle] url`.
pub const ORACLE_URL_ENV: &str = "FORESIGHT_ORACLE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub evaluators: EvaluatorsConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Cycle timing and per-cycle limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub oracle_timeout_ms: u64,
    pub settlement_timeout_ms: u64,
    /// Candidates submitted to the registry per cycle.
    pub max_proposals_per_cycle: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 12,
            oracle_timeout_ms: 3_000,
            settlement_timeout_ms: 5_000,
            max_proposals_per_cycle: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    #[default]
    Simulated,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub source: FeedSource,
    /// Endpoint for the HTTP feed.
    pub url: Option<String>,
    pub symbols: Vec<String>,
    /// Readings kept per symbol for momentum and variance.
    pub history_len: usize,
    /// RNG seed for the simulated feed.
    pub seed: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            source: FeedSource::Simulated,
            url: None,
            symbols: vec!["BTC/USD".into(), "ETH/USD".into(), "SOL/USD".into()],
            history_len: 32,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub quorum: usize,
    pub threshold: Decimal,
    /// Finalized proposals kept for history queries.
    pub retention: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            quorum: 4,
            threshold: Decimal::from(60),
            retention: crate::service::DEFAULT_RETENTION,
        }
    }
}

impl From<&ConsensusConfig> for ConsensusRule {
    fn from(config: &ConsensusConfig) -> Self {
        Self {
            quorum: config.quorum,
            threshold: config.threshold,
        }
    }
}

/// Candidate discovery tuning. Ratios are relative to the current price.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// A round level within this ratio of price is a candidate strike.
    pub round_proximity: Decimal,
    /// Round levels closer than this are skipped as trivial.
    pub min_strike_distance: Decimal,
    /// Move since the previous sample that counts as momentum.
    pub momentum_threshold: Decimal,
    /// Momentum strike offset beyond the current price.
    pub momentum_offset: Decimal,
    /// Emit a variety candidate every this many cycles (0 disables).
    pub variety_every: u64,
    pub variety_offset: Decimal,
    pub round_number_minutes: i64,
    pub momentum_minutes: i64,
    pub variety_minutes: i64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            round_proximity: Decimal::new(5, 3),
            min_strike_distance: Decimal::new(5, 4),
            momentum_threshold: Decimal::new(3, 3),
            momentum_offset: Decimal::new(1, 2),
            variety_every: 5,
            variety_offset: Decimal::new(2, 2),
            round_number_minutes: 60,
            momentum_minutes: 30,
            variety_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub safe_markets_per_hour: u32,
    pub max_markets_per_hour: u32,
    pub asset_window_minutes: i64,
    pub max_asset_deployments: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let limits = RiskLimits::default();
        Self {
            safe_markets_per_hour: limits.safe_markets_per_hour,
            max_markets_per_hour: limits.max_markets_per_hour,
            asset_window_minutes: limits.asset_window.num_minutes(),
            max_asset_deployments: limits.max_asset_deployments,
        }
    }
}

impl From<&RiskConfig> for RiskLimits {
    fn from(config: &RiskConfig) -> Self {
        Self {
            safe_markets_per_hour: config.safe_markets_per_hour,
            max_markets_per_hour: config.max_markets_per_hour,
            asset_window: chrono::Duration::minutes(config.asset_window_minutes),
            max_asset_deployments: config.max_asset_deployments,
        }
    }
}

/// Liquidity seeding and market lifecycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Collateral deposited into each new market, in base units.
    pub seed_liquidity: Units,
    /// Skew opening odds toward the side the current price favours.
    pub skew_odds: bool,
    pub min_yes_odds: Decimal,
    pub max_yes_odds: Decimal,
    /// How strongly relative strike distance moves the opening odds.
    pub skew_sensitivity: Decimal,
    /// Due markets with no price for this long are forced invalid.
    pub invalidate_after_minutes: i64,
    /// Buy fee in basis points.
    pub fee_bps: Units,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            seed_liquidity: 1_000_000_000,
            skew_odds: true,
            min_yes_odds: Decimal::new(2, 1),
            max_yes_odds: Decimal::new(8, 1),
            skew_sensitivity: Decimal::from(10),
            invalidate_after_minutes: 60,
            fee_bps: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementMode {
    #[default]
    Simulated,
    /// Settlement unreachable; every market uses the simulated fallback.
    Offline,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    pub mode: SettlementMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub history: usize,
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            history: 200,
            channel_capacity: 256,
        }
    }
}

impl Config {
    /// Load, apply environment overrides and validate.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config = Self::parse(&content)?;
        config.apply_overrides(std::env::var(ORACLE_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating.
    #[allow(clippy::result_large_err)]
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content).map_err(ConfigError::Parse)?)
    }

    /// Apply values taken from the environment.
    pub fn apply_overrides(&mut self, oracle_url: Option<String>) {
        if let Some(url) = oracle_url.filter(|u| !u.trim().is_empty()) {
            self.oracle.url = Some(url);
        }
    }

    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(invalid("scheduler.interval_secs", "must be positive"));
        }
        if self.oracle.symbols.is_empty() {
            return Err(ConfigError::MissingField {
                field: "oracle.symbols",
            }
            .into());
        }
        if self.oracle.source == FeedSource::Http
            && self.oracle.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(ConfigError::MissingField { field: "oracle.url" }.into());
        }
        if self.consensus.quorum == 0 {
            return Err(invalid("consensus.quorum", "must be at least 1"));
        }
        if self.consensus.threshold <= Decimal::ZERO || self.consensus.threshold > Decimal::from(100)
        {
            return Err(invalid("consensus.threshold", "must be in (0, 100]"));
        }
        let mut kinds = self.evaluators.enabled.clone();
        kinds.sort_by_key(|k| k.as_str());
        kinds.dedup();
        if kinds.is_empty() {
            return Err(invalid("evaluators.enabled", "at least one evaluator is required"));
        }
        if self.consensus.quorum > kinds.len() {
            return Err(invalid(
                "consensus.quorum",
                format!("{} exceeds the {} enabled evaluators", self.consensus.quorum, kinds.len()),
            ));
        }
        let ledger = &self.ledger;
        if ledger.seed_liquidity == 0 {
            return Err(invalid("ledger.seed_liquidity", "must be positive"));
        }
        if ledger.min_yes_odds <= Decimal::ZERO
            || ledger.max_yes_odds >= Decimal::ONE
            || ledger.min_yes_odds > ledger.max_yes_odds
        {
            return Err(invalid(
                "ledger.min_yes_odds",
                "odds bounds must satisfy 0 < min <= max < 1",
            ));
        }
        if ledger.fee_bps >= crate::domain::amm::BPS {
            return Err(invalid("ledger.fee_bps", "must be below 10000"));
        }
        if self.risk.max_markets_per_hour == 0 {
            return Err(invalid("risk.max_markets_per_hour", "must be positive"));
        }
        Ok(())
    }

    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                let _ = fmt().json().with_env_filter(filter).try_init();
            }
            _ => {
                let _ = fmt().with_env_filter(filter).try_init();
            }
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}
