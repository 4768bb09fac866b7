//! Command-line interface definitions.

pub mod check;
pub mod output;
pub mod run;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Foresight - conviction-consensus market creation on a constant-product AMM.
#[derive(Parser, Debug)]
#[command(name = "foresight")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the market-creation engine until Ctrl-C
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `foresight check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration file
    Config(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the cycle interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::parse_from([
            "foresight",
            "run",
            "--config",
            "local.toml",
            "--interval",
            "5",
            "--json-logs",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("local.toml"));
        assert_eq!(args.interval, Some(5));
        assert!(args.json_logs);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn parses_check_config_with_default_path() {
        let cli = Cli::parse_from(["foresight", "check", "config"]);
        let Commands::Check(CheckCommand::Config(arg)) = cli.command else {
            panic!("expected check config");
        };
        assert_eq!(arg.config, PathBuf::from("config.toml"));
    }
}
