//! Stateful services: consensus, the market ledger, risk and events.

pub mod evaluator;
mod ledger;
mod notifier;
mod registry;
mod risk;

pub use evaluator::{Assessment, EvaluationContext, Evaluator, EvaluatorKind, EvaluatorRegistry};
pub use ledger::MarketLedger;
pub use notifier::{Event, EventBus, EventRecord, LogNotifier, Notifier, NotifierRegistry, NullNotifier};
pub use registry::{ConvictionRegistry, VoteOutcome, DEFAULT_RETENTION};
pub use risk::{RiskGuard, RiskHealth, RiskLimits};
