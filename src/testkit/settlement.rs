//! Settlement executors for failure-path tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{MarketRef, Outcome, Price};
use crate::error::ExternalError;
use crate::port::{MarketCreation, SettlementExecutor};

/// Fails every call with `Rejected`, counting attempts.
#[derive(Clone, Default)]
pub struct FailingSettlement {
    attempts: Arc<AtomicU32>,
}

impl FailingSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementExecutor for FailingSettlement {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn submit_market_creation(
        &self,
        _params: &MarketCreation,
    ) -> Result<MarketRef, ExternalError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ExternalError::Rejected {
            service: "settlement",
            reason: "out of gas".into(),
        })
    }

    async fn submit_resolution(
        &self,
        _market_ref: &MarketRef,
        _price: Price,
    ) -> Result<Outcome, ExternalError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ExternalError::Rejected {
            service: "settlement",
            reason: "out of gas".into(),
        })
    }
}

/// Accepts everything and records what it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingSettlement {
    created: Arc<Mutex<Vec<MarketCreation>>>,
    resolved: Arc<Mutex<Vec<(MarketRef, Price)>>>,
}

impl RecordingSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<MarketCreation> {
        self.created.lock().clone()
    }

    pub fn resolved(&self) -> Vec<(MarketRef, Price)> {
        self.resolved.lock().clone()
    }
}

#[async_trait]
impl SettlementExecutor for RecordingSettlement {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn submit_market_creation(
        &self,
        params: &MarketCreation,
    ) -> Result<MarketRef, ExternalError> {
        let mut created = self.created.lock();
        created.push(params.clone());
        Ok(MarketRef::external(format!("rec-{}", created.len())))
    }

    async fn submit_resolution(
        &self,
        market_ref: &MarketRef,
        price: Price,
    ) -> Result<Outcome, ExternalError> {
        let strike_and_direction = self
            .created
            .lock()
            .iter()
            .enumerate()
            .find(|(i, _)| format!("rec-{}", i + 1) == market_ref.id())
            .map(|(_, c)| (c.strike, c.direction));
        self.resolved.lock().push((market_ref.clone(), price));
        match strike_and_direction {
            Some((strike, direction)) if direction.resolves_yes(price, strike) => Ok(Outcome::Yes),
            Some(_) => Ok(Outcome::No),
            None => Err(ExternalError::Rejected {
                service: "settlement",
                reason: format!("unknown market ref {}", market_ref.id()),
            }),
        }
    }
}
