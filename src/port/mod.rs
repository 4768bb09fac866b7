//! Interfaces to external collaborators.
//!
//! Adapters in [`crate::adapter`] implement these traits; tests substitute
//! scripted versions from the testkit.

mod feed;
mod settlement;

pub use feed::PriceFeed;
pub use settlement::{MarketCreation, SettlementExecutor};
