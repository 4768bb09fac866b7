//! Handler for `check config`.

use std::path::Path;

use crate::app::{Config, FeedSource, ORACLE_URL_ENV};
use crate::cli::output;
use crate::error::Result;

/// Load and validate a configuration file, printing a summary.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("Configuration invalid: {e}"));
            return Err(e);
        }
    };

    output::ok("Configuration file is valid");
    output::section("Summary");
    output::key_value("Interval", format!("{}s", config.scheduler.interval_secs));
    output::key_value("Symbols", config.oracle.symbols.join(", "));
    output::key_value("Feed", format!("{:?}", config.oracle.source));
    output::key_value(
        "Consensus",
        format!(
            "quorum {} / threshold {}",
            config.consensus.quorum, config.consensus.threshold
        ),
    );
    output::key_value(
        "Evaluators",
        config
            .evaluators
            .enabled
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    output::key_value("Settlement", format!("{:?}", config.settlement.mode));
    output::key_value("Seed liquidity", config.ledger.seed_liquidity);
    output::key_value("Fee (bps)", config.ledger.fee_bps);

    if config.oracle.source == FeedSource::Http && std::env::var(ORACLE_URL_ENV).is_ok() {
        output::warn(&format!("Oracle URL taken from {ORACLE_URL_ENV}"));
    }
    println!();
    Ok(())
}
