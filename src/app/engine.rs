//! Engine wiring and query surface.
//!
//! Builds the registry, ledger, risk guard and event bus from configuration,
//! hands them to a [`CycleScheduler`], and exposes read-only queries plus the
//! circuit-breaker controls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::{Config, FeedSource, SettlementMode};
use super::scheduler::{Components, CycleScheduler, RunSummary};
use crate::adapter::{OfflineSettlement, SimulatedFeed, SimulatedSettlement};
use crate::domain::{ConsensusResult, ConsensusRule, MarketSummary, Proposal};
use crate::error::{ConfigError, Error, Result};
use crate::port::{PriceFeed, SettlementExecutor};
use crate::service::{
    ConvictionRegistry, Event, EventBus, EventRecord, LogNotifier, MarketLedger, NotifierRegistry,
    RiskGuard, RiskHealth, RiskLimits,
};

fn build_feed(config: &Config) -> Result<Arc<dyn PriceFeed>> {
    match config.oracle.source {
        FeedSource::Simulated => Ok(Arc::new(SimulatedFeed::new(config.oracle.seed))),
        #[cfg(feature = "http-feed")]
        FeedSource::Http => {
            let url = config
                .oracle
                .url
                .as_deref()
                .ok_or(ConfigError::MissingField { field: "oracle.url" })?;
            let timeout = std::time::Duration::from_millis(config.scheduler.oracle_timeout_ms);
            Ok(Arc::new(crate::adapter::HttpFeed::new(url, timeout)?))
        }
        #[cfg(not(feature = "http-feed"))]
        FeedSource::Http => Err(ConfigError::InvalidValue {
            field: "oracle.source",
            reason: "built without the http-feed feature".into(),
        }
        .into()),
    }
}

fn build_settlement(config: &Config) -> Arc<dyn SettlementExecutor> {
    match config.settlement.mode {
        SettlementMode::Simulated => Arc::new(SimulatedSettlement::new()),
        SettlementMode::Offline => Arc::new(OfflineSettlement),
    }
}

/// Owns the shared services and at most one running scheduler.
pub struct Engine {
    config: Config,
    components: Components,
    running: Arc<AtomicBool>,
}

impl Engine {
    /// Build an engine with the adapters named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let feed = build_feed(&config)?;
        let settlement = build_settlement(&config);
        let mut notifiers = NotifierRegistry::new();
        notifiers.register(Box::new(LogNotifier));
        Self::with_collaborators(config, feed, settlement, notifiers)
    }

    /// Build an engine around explicit collaborators.
    pub fn with_collaborators(
        config: Config,
        feed: Arc<dyn PriceFeed>,
        settlement: Arc<dyn SettlementExecutor>,
        notifiers: NotifierRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let registry = ConvictionRegistry::new(
            ConsensusRule::from(&config.consensus),
            config.oracle.symbols.iter().cloned(),
        )
        .with_retention(config.consensus.retention);
        let components = Components {
            registry: Arc::new(registry),
            ledger: Arc::new(MarketLedger::new(config.ledger.fee_bps)),
            risk: Arc::new(RiskGuard::new(RiskLimits::from(&config.risk), Utc::now())),
            events: Arc::new(EventBus::new(
                notifiers,
                config.events.history,
                config.events.channel_capacity,
            )),
            feed,
            settlement,
        };
        info!(
            feed = components.feed.name(),
            settlement = components.settlement.name(),
            symbols = config.oracle.symbols.len(),
            "Engine initialised"
        );
        Ok(Self {
            config,
            components,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A scheduler over this engine's services, for driving cycles by hand.
    #[must_use]
    pub fn scheduler(&self) -> CycleScheduler {
        CycleScheduler::new(&self.config, self.components.clone())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the scheduling loop. Only one may run at a time.
    pub fn start(&self) -> Result<SchedulerHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let (stop, shutdown) = watch::channel(false);
        let scheduler = self.scheduler();
        let running = Arc::clone(&self.running);
        let task = tokio::spawn(async move {
            let summary = scheduler.run(shutdown).await;
            running.store(false, Ordering::SeqCst);
            summary
        });
        Ok(SchedulerHandle {
            stop,
            task,
            running: Arc::clone(&self.running),
        })
    }

    /// Proposals still collecting votes, oldest first.
    #[must_use]
    pub fn pending_proposals(&self) -> Vec<Proposal> {
        self.components.registry.pending()
    }

    /// Finalized consensus results, in finalization order.
    #[must_use]
    pub fn consensus_history(&self) -> Vec<ConsensusResult> {
        self.components.registry.history()
    }

    /// Markets open for trading now.
    #[must_use]
    pub fn active_markets(&self) -> Vec<MarketSummary> {
        self.components.ledger.active(Utc::now())
    }

    #[must_use]
    pub fn risk_health(&self) -> RiskHealth {
        self.components.risk.health(Utc::now())
    }

    /// Halt new approvals and deployments until reset.
    pub fn trip_circuit_breaker(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.components.risk.trigger_circuit_breaker(reason.clone());
        self.components.events.publish(Event::CircuitBreakerToggled {
            active: true,
            reason: Some(reason),
        });
    }

    pub fn reset_circuit_breaker(&self) {
        self.components.risk.reset();
        self.components.events.publish(Event::CircuitBreakerToggled {
            active: false,
            reason: None,
        });
    }

    #[must_use]
    pub fn recent_events(&self) -> Vec<EventRecord> {
        self.components.events.recent()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ConvictionRegistry> {
        &self.components.registry
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<MarketLedger> {
        &self.components.ledger
    }

    #[must_use]
    pub fn risk(&self) -> &Arc<RiskGuard> {
        &self.components.risk
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.components.events
    }
}

/// Control handle for a running scheduler.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<RunSummary>,
    running: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Ask the loop to stop after the current cycle.
    pub fn stop(&self) {
        if self.stop.send(true).is_err() {
            warn!("Scheduler already gone");
        }
    }

    /// Wait for the loop to finish.
    pub async fn join(self) -> RunSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Scheduler task failed");
                self.running.store(false, Ordering::SeqCst);
                RunSummary::default()
            }
        }
    }

    /// Stop and wait.
    pub async fn shutdown(self) -> RunSummary {
        self.stop();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::config::fast;
    use crate::testkit::domain::{snapshot, t0};
    use crate::testkit::feed::ScriptedFeed;
    use crate::testkit::notifier::RecordingNotifier;
    use rust_decimal_macros::dec;

    fn engine(feed: ScriptedFeed, recorder: &RecordingNotifier) -> Engine {
        let mut notifiers = NotifierRegistry::new();
        notifiers.register(Box::new(recorder.clone()));
        Engine::with_collaborators(
            fast(),
            Arc::new(feed),
            Arc::new(SimulatedSettlement::new()),
            notifiers,
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = fast();
        config.consensus.quorum = 0;
        let err = Engine::from_config(config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn breaker_toggles_publish_events() {
        let recorder = RecordingNotifier::new();
        let engine = engine(ScriptedFeed::new(), &recorder);

        engine.trip_circuit_breaker("manual halt");
        assert!(engine.risk_health().circuit_breaker);
        engine.reset_circuit_breaker();
        assert!(!engine.risk_health().circuit_breaker);

        let toggles = recorder.matching(|e| matches!(e, Event::CircuitBreakerToggled { .. }));
        assert_eq!(
            toggles,
            vec![
                Event::CircuitBreakerToggled {
                    active: true,
                    reason: Some("manual halt".into())
                },
                Event::CircuitBreakerToggled {
                    active: false,
                    reason: None
                },
            ]
        );
        assert_eq!(engine.recent_events().len(), 2);
    }

    #[tokio::test]
    async fn only_one_scheduler_runs() {
        let recorder = RecordingNotifier::new();
        let feed = ScriptedFeed::new();
        feed.push(snapshot(&[("BTC/USD", dec!(67250)), ("ETH/USD", dec!(3450))], t0()));
        let engine = engine(feed, &recorder);

        let handle = engine.start().unwrap();
        assert!(engine.is_running());
        assert!(matches!(engine.start(), Err(Error::AlreadyRunning)));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let summary = handle.shutdown().await;
        assert!(summary.cycles >= 1);
        assert!(!engine.is_running());
        assert!(engine.start().is_ok());
    }
}
