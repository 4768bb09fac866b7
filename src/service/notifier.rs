//! Event publication for observers.
//!
//! The [`Notifier`] trait defines the interface for event handlers, which
//! are collected in a [`NotifierRegistry`]. The [`EventBus`] wraps a registry
//! with a bounded history for late subscribers and a broadcast channel for
//! live ones. Publishing is fire-and-forget: it never blocks and never fails.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::{Category, Conviction, EvaluatorId, MarketId, Outcome, Price, ProposalId, Units};

/// Events published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProposalCreated {
        proposal_id: ProposalId,
        question: String,
        asset: String,
        category: Category,
    },
    VoteCast {
        proposal_id: ProposalId,
        evaluator: EvaluatorId,
        score: Conviction,
        rationale: String,
    },
    ConsensusReached {
        proposal_id: ProposalId,
        vote_count: usize,
        mean_score: Decimal,
        approved: bool,
    },
    MarketDeployed {
        market_id: MarketId,
        proposal_id: ProposalId,
        market_ref: String,
        simulated: bool,
        expires_at: DateTime<Utc>,
    },
    LiquidityAdded {
        market_id: MarketId,
        amount: Units,
        yes_odds: Price,
    },
    RiskAlert {
        reason: String,
        proposal_id: Option<ProposalId>,
    },
    CircuitBreakerToggled {
        active: bool,
        reason: Option<String>,
    },
    MarketResolved {
        market_id: MarketId,
        outcome: Outcome,
        settlement_price: Option<Price>,
    },
}

/// An event stamped with its position in the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: Event,
}

/// Trait for event handlers.
pub trait Notifier: Send + Sync {
    /// Handle an event. Must not block.
    fn notify(&self, event: &EventRecord);
}

/// Registry of notifiers.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn notify_all(&self, event: &EventRecord) {
        for notifier in &self.notifiers {
            notifier.notify(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

/// A no-op notifier.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &EventRecord) {}
}

/// Mirrors events to the tracing log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, record: &EventRecord) {
        match &record.event {
            Event::ProposalCreated {
                proposal_id,
                question,
                category,
                ..
            } => {
                info!(proposal_id = %proposal_id, category = %category, question = %question, "Proposal created");
            }
            Event::VoteCast {
                proposal_id,
                evaluator,
                score,
                rationale,
            } => {
                info!(
                    proposal_id = %proposal_id,
                    evaluator = %evaluator,
                    score = score.value(),
                    rationale = %rationale,
                    "Vote cast"
                );
            }
            Event::ConsensusReached {
                proposal_id,
                vote_count,
                mean_score,
                approved,
            } => {
                info!(
                    proposal_id = %proposal_id,
                    votes = vote_count,
                    mean = %mean_score,
                    approved,
                    "Consensus reached"
                );
            }
            Event::MarketDeployed {
                market_id,
                market_ref,
                simulated,
                ..
            } => {
                info!(market_id = %market_id, market_ref = %market_ref, simulated, "Market deployed");
            }
            Event::LiquidityAdded {
                market_id,
                amount,
                yes_odds,
            } => {
                info!(market_id = %market_id, amount = %amount, yes_odds = %yes_odds, "Liquidity added");
            }
            Event::RiskAlert {
                reason,
                proposal_id,
            } => {
                warn!(reason = %reason, proposal_id = ?proposal_id, "Risk alert");
            }
            Event::CircuitBreakerToggled { active, reason } => {
                warn!(active, reason = ?reason, "Circuit breaker toggled");
            }
            Event::MarketResolved {
                market_id,
                outcome,
                settlement_price,
            } => {
                info!(market_id = %market_id, outcome = %outcome, price = ?settlement_price, "Market resolved");
            }
        }
    }
}

/// Publishes events to notifiers, a bounded history and live subscribers.
pub struct EventBus {
    notifiers: NotifierRegistry,
    history: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
    seq: AtomicU64,
    tx: broadcast::Sender<EventRecord>,
}

impl EventBus {
    /// Create a bus retaining `history` events, with a live channel of
    /// `channel_capacity` (slow subscribers lag rather than block).
    #[must_use]
    pub fn new(notifiers: NotifierRegistry, history: usize, channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            notifiers,
            history: Mutex::new(VecDeque::with_capacity(history)),
            capacity: history,
            seq: AtomicU64::new(0),
            tx,
        }
    }

    /// A bus with only the log notifier.
    #[must_use]
    pub fn with_logging(history: usize) -> Self {
        let mut notifiers = NotifierRegistry::new();
        notifiers.register(Box::new(LogNotifier));
        Self::new(notifiers, history, 256)
    }

    pub fn publish(&self, event: Event) {
        let record = EventRecord {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            at: Utc::now(),
            event,
        };

        {
            let mut history = self.history.lock();
            if self.capacity > 0 {
                if history.len() == self.capacity {
                    history.pop_front();
                }
                history.push_back(record.clone());
            }
        }

        self.notifiers.notify_all(&record);
        // No receivers is fine.
        let _ = self.tx.send(record);
    }

    /// Retained events, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<EventRecord> {
        self.history.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.tx.subscribe()
    }

    /// Total events published since creation.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_logging(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingNotifier {
        count: Arc<AtomicUsize>,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, _event: &EventRecord) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn alert(n: usize) -> Event {
        Event::RiskAlert {
            reason: format!("alert {n}"),
            proposal_id: None,
        }
    }

    #[test]
    fn registry_notifies_all() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(CountingNotifier { count: count.clone() }));
        registry.register(Box::new(CountingNotifier { count: count.clone() }));
        registry.register(Box::new(NullNotifier));

        let bus = EventBus::new(registry, 10, 4);
        bus.publish(alert(0));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn history_is_bounded_ring() {
        let bus = EventBus::new(NotifierRegistry::new(), 3, 4);
        for i in 0..5 {
            bus.publish(alert(i));
        }
        let recent = bus.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].seq, 2);
        assert_eq!(recent[2].event, alert(4));
        assert_eq!(bus.published(), 5);
    }

    #[tokio::test]
    async fn subscribers_receive_live_events() {
        let bus = EventBus::new(NotifierRegistry::new(), 10, 4);
        let mut rx = bus.subscribe();
        bus.publish(alert(7));
        let record = rx.recv().await.unwrap();
        assert_eq!(record.event, alert(7));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(alert(1)).unwrap();
        assert_eq!(json["type"], "risk_alert");
    }
}
