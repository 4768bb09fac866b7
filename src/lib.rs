//! Foresight - conviction-consensus creation of binary prediction markets.
//!
//! A fixed-interval scheduler reads oracle prices, discovers candidate
//! markets, and routes each through a panel of evaluators. Proposals whose
//! mean conviction clears the threshold are deployed as constant-product
//! markets, subject to a risk guard with rate limits and a circuit breaker.
//!
//! # Modules
//!
//! - [`domain`] - Value types: proposals, votes, oracle readings, AMM pools, markets
//! - [`service`] - Conviction registry, market ledger, risk guard, evaluators, events
//! - [`port`] - Traits for the price feed and settlement layer
//! - [`adapter`] - Simulated and HTTP implementations of the ports
//! - [`app`] - Configuration, discovery, the cycle scheduler and the engine
//! - [`cli`] - Command-line interface
//! - [`error`] - Error types for the crate
//!
//! # Features
//!
//! - `http-feed` (default) - HTTP oracle feed via `reqwest`
//! - `testkit` - Test builders and scripted collaborators
//!
//! # Example
//!
//! ```no_run
//! use foresight::app::{Config, Engine};
//!
//! # async fn demo() -> foresight::error::Result<()> {
//! let engine = Engine::from_config(Config::default())?;
//! let handle = engine.start()?;
//! // ...
//! let summary = handle.shutdown().await;
//! println!("{} markets deployed", summary.deployed);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod port;
pub mod service;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
