//! Exchange-agnostic domain types: proposals, votes, oracle readings,
//! constant-product pools and markets.

pub mod amm;
pub mod error;
mod ids;
mod market;
mod money;
mod oracle;
mod proposal;
mod vote;

pub use amm::{Pools, Side};
pub use ids::{EvaluatorId, HolderId, MarketId, ProposalId};
pub use market::{Fill, Holding, Market, MarketRef, MarketSummary, Outcome};
pub use money::{units_to_decimal, Price, Units};
pub use oracle::{OracleSnapshot, PriceHistory, PricePoint};
pub use proposal::{
    Category, Direction, MarketKey, Proposal, ProposalDraft, ProposalDraftBuilder, ProposalStatus,
    MAX_DURATION_DAYS,
};
pub use vote::{ConsensusResult, ConsensusRule, Conviction, Vote};
