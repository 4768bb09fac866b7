//! Domain validation errors.
//!
//! These errors are returned when caller input violates a domain rule at the
//! boundary. They never leave partially-updated state behind.
//!
//! # Examples
//!
//! ```
//! use foresight::domain::error::DomainError;
//! use foresight::domain::ProposalDraft;
//!
//! let draft = ProposalDraft::builder()
//!     .question("")
//!     .asset("BTC/USD")
//!     .build();
//!
//! assert!(matches!(draft.validate(), Err(DomainError::EmptyQuestion)));
//! ```

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Proposal question must contain text.
    #[error("question cannot be empty")]
    EmptyQuestion,

    /// Proposal asset must name a feed symbol.
    #[error("asset reference cannot be empty")]
    EmptyAsset,

    /// Proposal asset must be one the oracle can price.
    #[error("asset {asset} is not a known feed symbol")]
    UnknownAsset {
        /// The symbol that failed to resolve.
        asset: String,
    },

    /// Market duration must be positive.
    #[error("duration must be positive, got {seconds}s")]
    NonPositiveDuration {
        /// The rejected duration in seconds.
        seconds: i64,
    },

    /// Market duration has an upper bound.
    #[error("duration must be at most {max_days} days, got {seconds}s")]
    DurationTooLong {
        /// The rejected duration in seconds.
        seconds: i64,
        /// The allowed maximum in days.
        max_days: i64,
    },

    /// Strike must be a positive price.
    #[error("strike must be positive, got {strike}")]
    NonPositiveStrike {
        /// The rejected strike.
        strike: rust_decimal::Decimal,
    },

    /// Scout confidence is a probability.
    #[error("confidence must be within [0, 1], got {confidence}")]
    ConfidenceOutOfRange {
        /// The rejected confidence.
        confidence: rust_decimal::Decimal,
    },
}
