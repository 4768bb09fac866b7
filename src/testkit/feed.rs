//! Scripted [`PriceFeed`] for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::OracleSnapshot;
use crate::error::ExternalError;
use crate::port::PriceFeed;

/// A feed that replays queued results.
///
/// Each `snapshot()` pops the next queued result. When the queue is empty
/// the last successful snapshot is repeated, or `Unavailable` is returned
/// if there never was one. Symbols not requested are filtered out.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    queue: Arc<Mutex<VecDeque<Result<OracleSnapshot, ExternalError>>>>,
    last: Arc<Mutex<Option<OracleSnapshot>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering; used to trigger timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, snapshot: OracleSnapshot) {
        self.queue.lock().push_back(Ok(snapshot));
    }

    pub fn push_failure(&self, reason: &str) {
        self.queue.lock().push_back(Err(ExternalError::Unavailable {
            service: "oracle",
            reason: reason.to_string(),
        }));
    }

    /// Number of `snapshot()` calls served.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn snapshot(&self, symbols: &[String]) -> Result<OracleSnapshot, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.queue.lock().pop_front();
        let snapshot = match next {
            Some(Ok(snapshot)) => {
                *self.last.lock() = Some(snapshot.clone());
                snapshot
            }
            Some(Err(e)) => return Err(e),
            None => self.last.lock().clone().ok_or_else(|| ExternalError::Unavailable {
                service: "oracle",
                reason: "script exhausted".into(),
            })?,
        };

        let mut filtered = OracleSnapshot::empty();
        if let Some(at) = snapshot.fetched_at() {
            filtered = filtered.with_fetched_at(at);
        }
        for symbol in symbols {
            if let Some(point) = snapshot.get(symbol) {
                filtered.insert(symbol.clone(), *point);
            }
        }
        Ok(filtered)
    }
}
