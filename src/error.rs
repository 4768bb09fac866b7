use thiserror::Error;

use crate::domain::amm::CurveError;
use crate::domain::error::DomainError;
use crate::domain::{HolderId, MarketId, ProposalId, Units};

/// Broad error classes used to decide how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected at the boundary.
    Validation,
    /// Operation on a finalized, expired or resolved entity.
    State,
    /// Pool exhaustion or nothing to redeem; retry with different parameters.
    InsufficientResource,
    /// Oracle or settlement failure; always recoverable locally.
    External,
    /// Bad configuration.
    Config,
}

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Conviction Registry errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("unknown proposal: {0}")]
    UnknownProposal(ProposalId),

    #[error("invalid proposal: {0}")]
    Validation(#[from] DomainError),
}

/// Market Ledger errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("unknown market: {0}")]
    UnknownMarket(MarketId),

    #[error("market {0} already exists")]
    DuplicateMarket(MarketId),

    #[error("market {0} is resolved or past expiry")]
    MarketInactive(MarketId),

    #[error("market {0} has not reached its resolution time")]
    NotExpired(MarketId),

    #[error("market {0} is already resolved")]
    AlreadyResolved(MarketId),

    #[error("market {0} is not resolved yet")]
    NotResolved(MarketId),

    #[error("market {0} already has liquidity")]
    AlreadySeeded(MarketId),

    #[error("slippage exceeded: got {actual}, required at least {minimum}")]
    SlippageExceeded { actual: Units, minimum: Units },

    #[error("pool cannot cover the requested amount")]
    InsufficientPool,

    #[error("holder {holder} has {available} shares, needs {requested}")]
    InsufficientShares {
        holder: HolderId,
        available: Units,
        requested: Units,
    },

    #[error("holder {0} has nothing to redeem")]
    NothingToRedeem(HolderId),

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("odds must be strictly between 0 and 1, got {0}")]
    InvalidOdds(rust_decimal::Decimal),

    #[error("market {0} would expire beyond the representable time range")]
    ExpiryOutOfRange(MarketId),

    #[error("arithmetic overflow")]
    Overflow,
}

impl From<CurveError> for LedgerError {
    fn from(err: CurveError) -> Self {
        match err {
            CurveError::ZeroAmount => LedgerError::InvalidAmount,
            CurveError::InsufficientPool => LedgerError::InsufficientPool,
            CurveError::InvalidOdds(odds) => LedgerError::InvalidOdds(odds),
            CurveError::Overflow => LedgerError::Overflow,
        }
    }
}

/// Risk Guard refusals.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("circuit breaker active: {reason}")]
    CircuitBreakerActive { reason: String },

    #[error("deployment rate limit reached: {current} >= {limit} per hour")]
    RateLimited { current: u32, limit: u32 },
}

/// Failures from external collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalError {
    #[error("{service} timed out after {millis}ms")]
    Timeout { service: &'static str, millis: u64 },

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error("{service} rejected request: {reason}")]
    Rejected { service: &'static str, reason: String },

    #[error("failed to decode {service} response: {reason}")]
    Decode { service: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Io(_) => ErrorKind::Config,
            Error::Domain(_) => ErrorKind::Validation,
            Error::Registry(e) => e.kind(),
            Error::Ledger(e) => e.kind(),
            Error::Risk(_) | Error::AlreadyRunning => ErrorKind::State,
            Error::External(_) => ErrorKind::External,
        }
    }
}

impl RegistryError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnknownProposal(_) | RegistryError::Validation(_) => {
                ErrorKind::Validation
            }
        }
    }
}

impl LedgerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::UnknownMarket(_)
            | LedgerError::DuplicateMarket(_)
            | LedgerError::SlippageExceeded { .. }
            | LedgerError::InvalidAmount
            | LedgerError::InvalidOdds(_)
            | LedgerError::ExpiryOutOfRange(_)
            | LedgerError::Overflow => ErrorKind::Validation,
            LedgerError::MarketInactive(_)
            | LedgerError::NotExpired(_)
            | LedgerError::AlreadyResolved(_)
            | LedgerError::NotResolved(_)
            | LedgerError::AlreadySeeded(_) => ErrorKind::State,
            LedgerError::InsufficientPool
            | LedgerError::InsufficientShares { .. }
            | LedgerError::NothingToRedeem(_) => ErrorKind::InsufficientResource,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
