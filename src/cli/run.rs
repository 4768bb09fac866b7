//! Handler for the `run` command.

use tokio::signal;
use tracing::info;

use crate::app::{Config, Engine, ORACLE_URL_ENV};
use crate::cli::{output, RunArgs};
use crate::error::Result;

/// Apply command-line overrides on top of the loaded file.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(interval) = args.interval {
        config.scheduler.interval_secs = interval;
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = "json".to_string();
    }
}

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        output::warn(&format!(
            "{} not found, running with defaults",
            args.config.display()
        ));
        let mut config = Config::default();
        config.apply_overrides(std::env::var(ORACLE_URL_ENV).ok());
        config
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    config.init_logging();

    info!(
        interval_secs = config.scheduler.interval_secs,
        symbols = ?config.oracle.symbols,
        "foresight starting"
    );

    let engine = Engine::from_config(config)?;
    let handle = engine.start()?;

    if let Err(e) = signal::ctrl_c().await {
        output::error(&format!("Failed to listen for Ctrl-C: {e}"));
    }
    info!("Shutdown signal received, finishing current cycle");
    let summary = handle.shutdown().await;

    let health = engine.risk_health();
    output::section("Run summary");
    output::key_value("Cycles", summary.cycles);
    output::key_value("Proposals", summary.proposals);
    output::key_value("Approved", summary.approved);
    output::key_value("Rejected", summary.rejected);
    output::key_value("Deployed", summary.deployed);
    output::key_value("Blocked", summary.blocked);
    output::key_value("Resolved", summary.resolved);
    output::key_value("Oracle failures", summary.oracle_failures);
    output::key_value("Active markets", engine.active_markets().len());
    output::key_value("Circuit breaker", if health.circuit_breaker { "tripped" } else { "off" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn overrides_replace_file_values() {
        let mut config = Config::default();
        let args = RunArgs {
            config: PathBuf::from("config.toml"),
            interval: Some(3),
            log_level: Some("debug".into()),
            json_logs: true,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.scheduler.interval_secs, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn no_flags_keep_file_values() {
        let mut config = Config::default();
        let args = RunArgs {
            config: PathBuf::from("config.toml"),
            interval: None,
            log_level: None,
            json_logs: false,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.scheduler.interval_secs, 12);
        assert_eq!(config.logging.format, "pretty");
    }
}
