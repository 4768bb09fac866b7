//! Application layer: configuration, discovery, scheduling and the engine.

mod config;
mod discovery;
mod engine;
mod scheduler;
mod seeding;

pub use config::{
    Config, ConsensusConfig, DiscoveryConfig, EventsConfig, FeedSource, LedgerConfig,
    LoggingConfig, OracleConfig, RiskConfig, SchedulerConfig, SettlementConfig, SettlementMode,
    ORACLE_URL_ENV,
};
pub use discovery::Discovery;
pub use engine::{Engine, SchedulerHandle};
pub use scheduler::{Components, CycleReport, CycleScheduler, RunSummary};
pub use seeding::opening_odds;
