//! Cycle scheduler: one pass per tick, never overlapping.
//!
//! ```text
//!   maintain risk ─▶ fetch snapshot ─▶ resolve due markets
//!        ─▶ discover candidates ─▶ propose + vote ─▶ deploy approved
//! ```
//!
//! External calls are awaited one at a time under a timeout. A failed or
//! timed-out oracle read means "no data this cycle"; a failed settlement
//! submission falls back to a simulated market reference.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::Config;
use super::discovery::Discovery;
use super::seeding::opening_odds;
use crate::domain::{
    Conviction, MarketId, MarketRef, MarketSummary, OracleSnapshot, Outcome, Price, PriceHistory,
    Proposal, ProposalDraft, ProposalId,
};
use crate::error::ExternalError;
use crate::port::{MarketCreation, PriceFeed, SettlementExecutor};
use crate::service::{
    ConvictionRegistry, EvaluationContext, EvaluatorRegistry, Event, EventBus, MarketLedger,
    RiskGuard, VoteOutcome,
};

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// Whether the oracle answered in time.
    pub oracle_ok: bool,
    pub symbols: usize,
    pub proposals: Vec<ProposalId>,
    pub approved: usize,
    pub rejected: usize,
    pub deployed: Vec<MarketId>,
    /// Approved proposals the Risk Guard refused to deploy.
    pub blocked: usize,
    /// Deployments that used a simulated reference after settlement failed.
    pub fallbacks: usize,
    pub resolved: Vec<(MarketId, Outcome)>,
}

/// Totals across every cycle of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub oracle_failures: u64,
    pub proposals: usize,
    pub approved: usize,
    pub rejected: usize,
    pub deployed: usize,
    pub blocked: usize,
    pub fallbacks: usize,
    pub resolved: usize,
}

impl RunSummary {
    fn absorb(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if !report.oracle_ok {
            self.oracle_failures += 1;
        }
        self.proposals += report.proposals.len();
        self.approved += report.approved;
        self.rejected += report.rejected;
        self.deployed += report.deployed.len();
        self.blocked += report.blocked;
        self.fallbacks += report.fallbacks;
        self.resolved += report.resolved.len();
    }
}

/// Timing and sizing taken from configuration.
#[derive(Debug, Clone)]
struct Settings {
    interval: StdDuration,
    oracle_timeout: StdDuration,
    settlement_timeout: StdDuration,
    max_proposals: usize,
    symbols: Vec<String>,
    invalidate_after: Duration,
}

/// Shared state the scheduler drives.
#[derive(Clone)]
pub struct Components {
    pub registry: Arc<ConvictionRegistry>,
    pub ledger: Arc<MarketLedger>,
    pub risk: Arc<RiskGuard>,
    pub events: Arc<EventBus>,
    pub feed: Arc<dyn PriceFeed>,
    pub settlement: Arc<dyn SettlementExecutor>,
}

pub struct CycleScheduler {
    settings: Settings,
    config: Config,
    components: Components,
    evaluators: EvaluatorRegistry,
    discovery: Discovery,
    history: PriceHistory,
    cycle: u64,
}

async fn bounded<T, F>(service: &'static str, limit: StdDuration, call: F) -> Result<T, ExternalError>
where
    F: Future<Output = Result<T, ExternalError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ExternalError::Timeout {
            service,
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

impl CycleScheduler {
    #[must_use]
    pub fn new(config: &Config, components: Components) -> Self {
        let settings = Settings {
            interval: StdDuration::from_secs(config.scheduler.interval_secs.max(1)),
            oracle_timeout: StdDuration::from_millis(config.scheduler.oracle_timeout_ms),
            settlement_timeout: StdDuration::from_millis(config.scheduler.settlement_timeout_ms),
            max_proposals: config.scheduler.max_proposals_per_cycle,
            symbols: config.oracle.symbols.clone(),
            invalidate_after: Duration::minutes(config.ledger.invalidate_after_minutes),
        };
        Self {
            settings,
            config: config.clone(),
            evaluators: EvaluatorRegistry::from_config(&config.evaluators),
            discovery: Discovery::new(config.discovery.clone()),
            history: PriceHistory::new(config.oracle.history_len),
            components,
            cycle: 0,
        }
    }

    /// Replace the evaluator set.
    #[must_use]
    pub fn with_evaluators(mut self, evaluators: EvaluatorRegistry) -> Self {
        self.evaluators = evaluators;
        self
    }

    #[must_use]
    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Cycles completed so far.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Tick until `shutdown` flips to true or its sender is dropped.
    ///
    /// The stop signal is only observed between cycles; a running cycle
    /// always completes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            symbols = ?self.settings.symbols,
            evaluators = self.evaluators.len(),
            "Scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            let report = self.run_cycle(Utc::now()).await;
            summary.absorb(&report);
        }

        info!(cycles = summary.cycles, deployed = summary.deployed, "Scheduler stopped");
        summary
    }

    /// Run one full pass at time `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        self.components.risk.maintain(now);

        let Some(snapshot) = self.fetch_snapshot().await else {
            debug!(cycle = self.cycle, "Oracle unavailable, skipping cycle");
            return report;
        };
        report.oracle_ok = true;
        report.symbols = snapshot.len();
        if !snapshot.is_empty() {
            self.history.record(&snapshot);
        }

        self.resolve_due(&snapshot, now, &mut report).await;

        if snapshot.is_empty() {
            debug!(cycle = self.cycle, "No price data this cycle, skipping discovery");
            return report;
        }

        let mut exclude = self.components.registry.open_keys();
        exclude.extend(self.components.ledger.active_keys());
        let drafts = self.discovery.discover(
            &snapshot,
            &self.history,
            self.cycle,
            &exclude,
            self.settings.max_proposals,
        );

        for draft in drafts {
            self.propose(draft, &snapshot, now, &mut report).await;
        }

        debug!(
            cycle = self.cycle,
            proposals = report.proposals.len(),
            deployed = report.deployed.len(),
            resolved = report.resolved.len(),
            "Cycle complete"
        );
        report
    }

    async fn fetch_snapshot(&self) -> Option<OracleSnapshot> {
        let feed = &self.components.feed;
        match bounded(
            "oracle",
            self.settings.oracle_timeout,
            feed.snapshot(&self.settings.symbols),
        )
        .await
        {
            Ok(snapshot) => {
                if snapshot.len() < self.settings.symbols.len() {
                    debug!(
                        received = snapshot.len(),
                        requested = self.settings.symbols.len(),
                        "Partial oracle snapshot"
                    );
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!(feed = feed.name(), error = %e, "Oracle fetch failed, no data this cycle");
                None
            }
        }
    }

    async fn resolve_due(
        &self,
        snapshot: &OracleSnapshot,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let ledger = &self.components.ledger;
        for market in ledger.due_for_resolution(now) {
            if let Some(price) = snapshot.price(&market.asset) {
                match ledger.resolve(&market.id, price, now) {
                    Ok(outcome) => {
                        self.components.events.publish(Event::MarketResolved {
                            market_id: market.id.clone(),
                            outcome,
                            settlement_price: Some(price),
                        });
                        self.confirm_resolution(&market, price, outcome).await;
                        report.resolved.push((market.id, outcome));
                    }
                    Err(e) => warn!(market_id = %market.id, error = %e, "Resolution rejected"),
                }
            } else if now - market.expires_at >= self.settings.invalidate_after {
                let reason = format!("no price for {} since expiry", market.asset);
                match ledger.invalidate(&market.id, reason, now) {
                    Ok(()) => {
                        self.components.events.publish(Event::MarketResolved {
                            market_id: market.id.clone(),
                            outcome: Outcome::Invalid,
                            settlement_price: None,
                        });
                        report.resolved.push((market.id, Outcome::Invalid));
                    }
                    Err(e) => warn!(market_id = %market.id, error = %e, "Invalidation rejected"),
                }
            } else {
                debug!(market_id = %market.id, asset = %market.asset, "Due market waiting for price");
            }
        }
    }

    /// Best-effort notification of the settlement layer. The local outcome
    /// stands regardless.
    async fn confirm_resolution(&self, market: &MarketSummary, price: Price, local: Outcome) {
        if market.market_ref.is_simulated() {
            return;
        }
        let settlement = &self.components.settlement;
        match bounded(
            "settlement",
            self.settings.settlement_timeout,
            settlement.submit_resolution(&market.market_ref, price),
        )
        .await
        {
            Ok(remote) if remote != local => {
                warn!(market_id = %market.id, local = %local, remote = %remote, "Settlement outcome differs");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(market_id = %market.id, error = %e, "Resolution submission failed");
            }
        }
    }

    async fn propose(
        &self,
        draft: ProposalDraft,
        snapshot: &OracleSnapshot,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let Components {
            registry,
            ledger,
            risk,
            events,
            ..
        } = &self.components;

        let proposal = match registry.create_proposal(draft, now) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Candidate rejected at creation");
                return;
            }
        };
        report.proposals.push(proposal.id().clone());
        events.publish(Event::ProposalCreated {
            proposal_id: proposal.id().clone(),
            question: proposal.question().to_string(),
            asset: proposal.asset().to_string(),
            category: proposal.category(),
        });

        let active_by_asset = ledger.active_by_asset();
        let ctx = EvaluationContext::new(snapshot, &self.history, risk, &active_by_asset, now);
        let mut decided = None;
        for (evaluator, assessment) in self.evaluators.evaluate_all(&proposal, &ctx) {
            let outcome = match registry.vote(
                proposal.id(),
                &evaluator,
                assessment.score,
                assessment.rationale.clone(),
                now,
            ) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(proposal_id = %proposal.id(), error = %e, "Vote rejected");
                    continue;
                }
            };
            if !matches!(outcome, VoteOutcome::Ignored(_)) {
                events.publish(Event::VoteCast {
                    proposal_id: proposal.id().clone(),
                    evaluator: evaluator.clone(),
                    score: Conviction::clamped(assessment.score),
                    rationale: assessment.rationale,
                });
            }
            if let VoteOutcome::Finalized(result) = outcome {
                decided = Some(result);
            }
        }

        let Some(result) = decided else {
            debug!(proposal_id = %proposal.id(), "Quorum not reached");
            return;
        };
        events.publish(Event::ConsensusReached {
            proposal_id: proposal.id().clone(),
            vote_count: result.vote_count,
            mean_score: result.mean_score,
            approved: result.approved,
        });

        if result.approved {
            report.approved += 1;
            self.deploy(&proposal, snapshot, now, report).await;
        } else {
            report.rejected += 1;
            info!(
                proposal_id = %proposal.id(),
                mean = %result.mean_score,
                question = %proposal.question(),
                "Proposal rejected"
            );
        }
    }

    async fn deploy(
        &self,
        proposal: &Proposal,
        snapshot: &OracleSnapshot,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let Components {
            ledger,
            risk,
            events,
            settlement,
            ..
        } = &self.components;

        if let Err(e) = risk.allows_deployment(now) {
            warn!(proposal_id = %proposal.id(), error = %e, "Deployment blocked");
            events.publish(Event::RiskAlert {
                reason: e.to_string(),
                proposal_id: Some(proposal.id().clone()),
            });
            report.blocked += 1;
            return;
        }

        let ledger_config = &self.config.ledger;
        let yes_odds = opening_odds(
            ledger_config,
            proposal.direction(),
            proposal.strike(),
            snapshot.price(proposal.asset()),
        );
        let market_id = MarketId::for_proposal(proposal.id());
        let params = MarketCreation {
            market_id: market_id.clone(),
            proposal_id: proposal.id().clone(),
            question: proposal.question().to_string(),
            asset: proposal.asset().to_string(),
            strike: proposal.strike(),
            direction: proposal.direction(),
            expires_at: now + proposal.duration(),
            liquidity: ledger_config.seed_liquidity,
            yes_odds,
        };

        let market_ref = match bounded(
            "settlement",
            self.settings.settlement_timeout,
            settlement.submit_market_creation(&params),
        )
        .await
        {
            Ok(market_ref) => market_ref,
            Err(e) => {
                warn!(
                    market_id = %market_id,
                    executor = settlement.name(),
                    error = %e,
                    "Settlement unavailable, deploying simulated market"
                );
                report.fallbacks += 1;
                MarketRef::simulated(format!("local-{market_id}"))
            }
        };

        let summary = match ledger.create_market(proposal, market_ref, now) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(market_id = %market_id, error = %e, "Market creation rejected");
                return;
            }
        };
        events.publish(Event::MarketDeployed {
            market_id: summary.id.clone(),
            proposal_id: proposal.id().clone(),
            market_ref: summary.market_ref.id().to_string(),
            simulated: summary.market_ref.is_simulated(),
            expires_at: summary.expires_at,
        });
        risk.on_market_deployed(proposal.asset(), now);

        match ledger.seed(&summary.id, ledger_config.seed_liquidity, yes_odds) {
            Ok(_) => events.publish(Event::LiquidityAdded {
                market_id: summary.id.clone(),
                amount: ledger_config.seed_liquidity,
                yes_odds,
            }),
            Err(e) => warn!(market_id = %summary.id, error = %e, "Liquidity seeding failed"),
        }
        report.deployed.push(summary.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_reports_timeout_with_limit() {
        let slow = async {
            tokio::time::sleep(StdDuration::from_millis(200)).await;
            Ok::<_, ExternalError>(1)
        };
        let err = bounded("oracle", StdDuration::from_millis(20), slow)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExternalError::Timeout {
                service: "oracle",
                millis: 20
            }
        );
    }

    #[tokio::test]
    async fn bounded_passes_through_results() {
        let ok = bounded("settlement", StdDuration::from_secs(1), async {
            Ok::<_, ExternalError>(7)
        })
        .await;
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn summary_accumulates_reports() {
        let mut summary = RunSummary::default();
        summary.absorb(&CycleReport {
            cycle: 1,
            oracle_ok: false,
            ..CycleReport::default()
        });
        summary.absorb(&CycleReport {
            cycle: 2,
            oracle_ok: true,
            approved: 2,
            blocked: 1,
            fallbacks: 1,
            ..CycleReport::default()
        });
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.oracle_failures, 1);
        assert_eq!(summary.approved, 2);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.fallbacks, 1);
    }
}
