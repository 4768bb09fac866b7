//! Concrete implementations of the external ports.

#[cfg(feature = "http-feed")]
mod http_feed;
mod settlement;
mod simulated_feed;

#[cfg(feature = "http-feed")]
pub use http_feed::HttpFeed;
pub use settlement::{OfflineSettlement, SimulatedSettlement};
pub use simulated_feed::SimulatedFeed;
