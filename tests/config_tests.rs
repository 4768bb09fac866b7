//! Configuration loading from disk.

use std::io::Write;

use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

use foresight::app::{Config, FeedSource, SettlementMode};
use foresight::error::{ConfigError, Error, ErrorKind};
use foresight::service::EvaluatorKind;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.scheduler.interval_secs, 12);
    assert_eq!(config.consensus.quorum, 4);
    assert_eq!(config.consensus.threshold, dec!(60));
    assert_eq!(config.oracle.symbols.len(), 3);
    assert_eq!(config.events.history, 200);
    assert_eq!(config.evaluators.enabled.len(), 4);
}

#[test]
fn full_file_round_trips_every_section() {
    let file = write_config(
        r#"
[logging]
level = "debug"
format = "json"

[scheduler]
interval_secs = 5
max_proposals_per_cycle = 1

[oracle]
source = "simulated"
symbols = ["BTC/USD"]
seed = 99

[consensus]
quorum = 2
threshold = 75

[discovery]
variety_every = 3
momentum_minutes = 45

[evaluators]
enabled = ["feasibility", "risk"]

[evaluators.risk]
baseline = 90

[risk]
max_markets_per_hour = 4

[ledger]
seed_liquidity = 5000
fee_bps = 30

[settlement]
mode = "offline"
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.scheduler.interval_secs, 5);
    assert_eq!(config.oracle.source, FeedSource::Simulated);
    assert_eq!(config.oracle.seed, 99);
    assert_eq!(config.consensus.threshold, dec!(75));
    assert_eq!(config.discovery.variety_every, 3);
    assert_eq!(config.discovery.momentum_minutes, 45);
    assert_eq!(
        config.evaluators.enabled,
        vec![EvaluatorKind::Feasibility, EvaluatorKind::Risk]
    );
    assert_eq!(config.evaluators.risk.baseline, 90);
    assert_eq!(config.risk.max_markets_per_hour, 4);
    assert_eq!(config.ledger.fee_bps, 30);
    assert_eq!(config.settlement.mode, SettlementMode::Offline);
}

#[test]
fn invalid_values_are_rejected_with_field_names() {
    let cases = [
        ("[consensus]\nquorum = 0", "consensus.quorum"),
        ("[consensus]\nthreshold = 120", "consensus.threshold"),
        ("[consensus]\nquorum = 5", "consensus.quorum"),
        ("[ledger]\nmin_yes_odds = 0.9", "ledger.min_yes_odds"),
        ("[ledger]\nfee_bps = 10000", "ledger.fee_bps"),
        ("[scheduler]\ninterval_secs = 0", "scheduler.interval_secs"),
    ];
    for (toml, field) in cases {
        let file = write_config(toml);
        let err = Config::load(file.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config, "{toml}");
        match err {
            Error::Config(ConfigError::InvalidValue { field: f, .. }) => assert_eq!(f, field),
            other => panic!("{toml}: unexpected error {other}"),
        }
    }
}

#[test]
fn http_feed_requires_url() {
    let file = write_config("[oracle]\nsource = \"http\"");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::MissingField { field: "oracle.url" })
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[scheduler\ninterval_secs = ");
    assert!(matches!(
        Config::load(file.path()),
        Err(Error::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(matches!(
        Config::load(missing),
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}
