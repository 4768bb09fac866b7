//! Oracle price feed port.

use async_trait::async_trait;

use crate::domain::OracleSnapshot;
use crate::error::ExternalError;

/// Source of reference prices.
///
/// Implementations must be thread-safe. A call may return a partial
/// snapshot (some symbols missing) or fail outright; callers treat both as
/// "less data this cycle".
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Feed name for logging.
    fn name(&self) -> &'static str;

    /// Read the latest price for each requested symbol.
    async fn snapshot(&self, symbols: &[String]) -> Result<OracleSnapshot, ExternalError>;
}
