//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] - Builders for proposals, snapshots and markets.
//! - [`feed`] - [`ScriptedFeed`](feed::ScriptedFeed), a price feed driven by a queue.
//! - [`settlement`] - Settlement executors that fail or record on demand.
//! - [`notifier`] - [`RecordingNotifier`](notifier::RecordingNotifier) for event assertions.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod domain;
pub mod feed;
pub mod notifier;
pub mod settlement;
