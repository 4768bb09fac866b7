//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use crate::app::{Config, SettlementMode};

/// Default configuration with short timeouts and the simulated settlement.
pub fn fast() -> Config {
    let mut config = Config::default();
    config.scheduler.interval_secs = 1;
    config.scheduler.oracle_timeout_ms = 200;
    config.scheduler.settlement_timeout_ms = 200;
    config.settlement.mode = SettlementMode::Simulated;
    config.oracle.symbols = vec!["BTC/USD".into(), "ETH/USD".into()];
    config
}
