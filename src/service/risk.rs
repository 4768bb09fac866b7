//! Risk Guard: deployment rate limiting and the circuit breaker.
//!
//! The hourly counter resets lazily on the first read after the window
//! elapses; there is no background timer. The per-asset window keeps recent
//! deployment timestamps for concentration checks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RiskError;

/// Rate and concentration limits.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Deployments per hour above which the risk evaluator starts penalising.
    pub safe_markets_per_hour: u32,
    /// Hard cap: deployments per hour beyond which deployment is refused.
    pub max_markets_per_hour: u32,
    /// Trailing window for per-asset concentration.
    pub asset_window: Duration,
    /// Deployments on one asset within the window considered concentrated.
    pub max_asset_deployments: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            safe_markets_per_hour: 6,
            max_markets_per_hour: 12,
            asset_window: Duration::minutes(30),
            max_asset_deployments: 2,
        }
    }
}

/// Mutable counters behind the guard.
#[derive(Debug)]
struct RiskGuardState {
    window_started: DateTime<Utc>,
    deployments_in_window: u32,
    total_deployments: u64,
    recent: VecDeque<(String, DateTime<Utc>)>,
}

impl RiskGuardState {
    fn roll(&mut self, now: DateTime<Utc>) {
        if now - self.window_started >= Duration::hours(1) {
            self.window_started = now;
            self.deployments_in_window = 0;
        }
    }

    fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        while self
            .recent
            .front()
            .is_some_and(|(_, at)| now - *at > window)
        {
            self.recent.pop_front();
        }
    }
}

/// Health report for observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskHealth {
    pub circuit_breaker: bool,
    pub breaker_reason: Option<String>,
    pub deployments_last_hour: u32,
    pub total_deployments: u64,
    pub safe_markets_per_hour: u32,
    pub max_markets_per_hour: u32,
    pub window_resets_at: DateTime<Utc>,
}

/// Shared rate limiter and kill-switch.
pub struct RiskGuard {
    limits: RiskLimits,
    state: Mutex<RiskGuardState>,
    /// When true, no proposal may pass and no market may deploy.
    circuit_breaker: AtomicBool,
    circuit_breaker_reason: RwLock<Option<String>>,
}

impl RiskGuard {
    #[must_use]
    pub fn new(limits: RiskLimits, now: DateTime<Utc>) -> Self {
        Self {
            limits,
            state: Mutex::new(RiskGuardState {
                window_started: now,
                deployments_in_window: 0,
                total_deployments: 0,
                recent: VecDeque::new(),
            }),
            circuit_breaker: AtomicBool::new(false),
            circuit_breaker_reason: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Markets deployed within the current hourly window.
    pub fn deployments_last_hour(&self, now: DateTime<Utc>) -> u32 {
        let mut state = self.state.lock();
        state.roll(now);
        state.deployments_in_window
    }

    /// All markets deployed since startup.
    pub fn total_deployments(&self) -> u64 {
        self.state.lock().total_deployments
    }

    /// Deployments on `asset` within the trailing asset window.
    pub fn asset_deployments(&self, asset: &str, now: DateTime<Utc>) -> u32 {
        let mut state = self.state.lock();
        state.prune(now, self.limits.asset_window);
        state.recent.iter().filter(|(a, _)| a == asset).count() as u32
    }

    /// Record a deployment.
    pub fn on_market_deployed(&self, asset: &str, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.roll(now);
        state.deployments_in_window += 1;
        state.total_deployments += 1;
        state.recent.push_back((asset.to_string(), now));
        state.prune(now, self.limits.asset_window);
    }

    /// Hourly maintenance: roll the window and prune stale asset entries.
    pub fn maintain(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.roll(now);
        state.prune(now, self.limits.asset_window);
    }

    pub fn is_tripped(&self) -> bool {
        self.circuit_breaker.load(Ordering::SeqCst)
    }

    pub fn breaker_reason(&self) -> Option<String> {
        self.circuit_breaker_reason.read().clone()
    }

    /// Trip the circuit breaker.
    pub fn trigger_circuit_breaker(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Triggering circuit breaker");
        *self.circuit_breaker_reason.write() = Some(reason);
        self.circuit_breaker.store(true, Ordering::SeqCst);
    }

    /// Reset the circuit breaker.
    pub fn reset(&self) {
        info!("Resetting circuit breaker");
        self.circuit_breaker.store(false, Ordering::SeqCst);
        *self.circuit_breaker_reason.write() = None;
    }

    /// Whether a new market may be deployed right now.
    pub fn allows_deployment(&self, now: DateTime<Utc>) -> Result<(), RiskError> {
        if self.is_tripped() {
            let reason = self.breaker_reason().unwrap_or_else(|| "unknown".to_string());
            return Err(RiskError::CircuitBreakerActive { reason });
        }
        let current = self.deployments_last_hour(now);
        if current >= self.limits.max_markets_per_hour {
            return Err(RiskError::RateLimited {
                current,
                limit: self.limits.max_markets_per_hour,
            });
        }
        Ok(())
    }

    pub fn health(&self, now: DateTime<Utc>) -> RiskHealth {
        let (deployments_last_hour, total_deployments, window_started) = {
            let mut state = self.state.lock();
            state.roll(now);
            (
                state.deployments_in_window,
                state.total_deployments,
                state.window_started,
            )
        };
        RiskHealth {
            circuit_breaker: self.is_tripped(),
            breaker_reason: self.breaker_reason(),
            deployments_last_hour,
            total_deployments,
            safe_markets_per_hour: self.limits.safe_markets_per_hour,
            max_markets_per_hour: self.limits.max_markets_per_hour,
            window_resets_at: window_started + Duration::hours(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(now: DateTime<Utc>) -> RiskGuard {
        RiskGuard::new(RiskLimits::default(), now)
    }

    #[test]
    fn starts_clear() {
        let now = Utc::now();
        let g = guard(now);
        assert!(!g.is_tripped());
        assert!(g.breaker_reason().is_none());
        assert_eq!(g.deployments_last_hour(now), 0);
        assert!(g.allows_deployment(now).is_ok());
    }

    #[test]
    fn trigger_and_reset() {
        let now = Utc::now();
        let g = guard(now);
        g.trigger_circuit_breaker("manual halt");
        assert!(g.is_tripped());
        assert_eq!(
            g.allows_deployment(now),
            Err(RiskError::CircuitBreakerActive {
                reason: "manual halt".into()
            })
        );
        g.reset();
        assert!(!g.is_tripped());
        assert!(g.breaker_reason().is_none());
    }

    #[test]
    fn hourly_counter_resets_lazily() {
        let now = Utc::now();
        let g = guard(now);
        g.on_market_deployed("BTC/USD", now);
        g.on_market_deployed("ETH/USD", now + Duration::minutes(10));
        assert_eq!(g.deployments_last_hour(now + Duration::minutes(20)), 2);
        assert_eq!(g.deployments_last_hour(now + Duration::minutes(61)), 0);
        assert_eq!(g.total_deployments(), 2);
    }

    #[test]
    fn rate_limit_blocks_deployment() {
        let now = Utc::now();
        let limits = RiskLimits {
            max_markets_per_hour: 2,
            ..Default::default()
        };
        let g = RiskGuard::new(limits, now);
        g.on_market_deployed("A", now);
        g.on_market_deployed("B", now);
        assert_eq!(
            g.allows_deployment(now),
            Err(RiskError::RateLimited {
                current: 2,
                limit: 2
            })
        );
    }

    #[test]
    fn asset_window_expires() {
        let now = Utc::now();
        let g = guard(now);
        g.on_market_deployed("BTC/USD", now);
        g.on_market_deployed("BTC/USD", now + Duration::minutes(5));
        g.on_market_deployed("ETH/USD", now + Duration::minutes(5));
        assert_eq!(g.asset_deployments("BTC/USD", now + Duration::minutes(10)), 2);
        assert_eq!(g.asset_deployments("BTC/USD", now + Duration::minutes(33)), 1);
        assert_eq!(g.asset_deployments("SOL/USD", now), 0);
    }

    #[test]
    fn health_reports_counters() {
        let now = Utc::now();
        let g = guard(now);
        g.on_market_deployed("BTC/USD", now);
        g.trigger_circuit_breaker("test");
        let health = g.health(now);
        assert!(health.circuit_breaker);
        assert_eq!(health.breaker_reason.as_deref(), Some("test"));
        assert_eq!(health.deployments_last_hour, 1);
        assert_eq!(health.window_resets_at, now + Duration::hours(1));
    }
}
