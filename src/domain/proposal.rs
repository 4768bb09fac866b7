//! Market proposals and the draft/builder used to create them.
//!
//! A [`ProposalDraft`] is caller input. The Conviction Registry validates it
//! and stamps an id and creation time to produce an immutable [`Proposal`].

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{Price, ProposalId};

/// Longest market a proposal may ask for.
pub const MAX_DURATION_DAYS: i64 = 365;

/// Which side of the strike resolves YES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// YES if settlement price >= strike.
    Above,
    /// YES if settlement price < strike.
    Below,
}

impl Direction {
    /// Whether a settlement price resolves this direction to YES.
    #[must_use]
    pub fn resolves_yes(self, price: Price, strike: Price) -> bool {
        match self {
            Direction::Above => price >= strike,
            Direction::Below => price < strike,
        }
    }

    /// Word used in generated question text.
    #[must_use]
    pub fn as_word(self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_word())
    }
}

/// How a candidate market was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Price is close to a round-number level.
    RoundNumber,
    /// Price moved sharply since the previous sample.
    Momentum,
    /// Periodic synthetic candidate for variety.
    Variety,
    /// Submitted by an operator.
    Manual,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::RoundNumber => "round_number",
            Category::Momentum => "momentum",
            Category::Variety => "variety",
            Category::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a proposal. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ProposalStatus {
    /// Returns true once consensus has been computed.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

/// Key used to avoid proposing the same market twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketKey {
    pub asset: String,
    pub strike: Price,
    pub direction: Direction,
}

/// Caller input for a new proposal.
#[derive(Debug, Clone)]
pub struct ProposalDraft {
    pub question: String,
    pub asset: String,
    pub strike: Price,
    pub direction: Direction,
    pub duration: Duration,
    pub category: Category,
    /// Scout's own confidence estimate in `[0, 1]`.
    pub confidence: Decimal,
}

impl ProposalDraft {
    /// Create a new builder with neutral defaults.
    pub fn builder() -> ProposalDraftBuilder {
        ProposalDraftBuilder::new()
    }

    /// Check field-level rules that do not need external context.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.question.trim().is_empty() {
            return Err(DomainError::EmptyQuestion);
        }
        if self.asset.trim().is_empty() {
            return Err(DomainError::EmptyAsset);
        }
        if self.duration <= Duration::zero() {
            return Err(DomainError::NonPositiveDuration {
                seconds: self.duration.num_seconds(),
            });
        }
        if self.duration > Duration::days(MAX_DURATION_DAYS) {
            return Err(DomainError::DurationTooLong {
                seconds: self.duration.num_seconds(),
                max_days: MAX_DURATION_DAYS,
            });
        }
        if self.strike <= Decimal::ZERO {
            return Err(DomainError::NonPositiveStrike {
                strike: self.strike,
            });
        }
        if self.confidence < Decimal::ZERO || self.confidence > Decimal::ONE {
            return Err(DomainError::ConfidenceOutOfRange {
                confidence: self.confidence,
            });
        }
        Ok(())
    }

    /// The de-duplication key of this draft.
    #[must_use]
    pub fn key(&self) -> MarketKey {
        MarketKey {
            asset: self.asset.clone(),
            strike: self.strike,
            direction: self.direction,
        }
    }
}

/// Builder for [`ProposalDraft`].
#[derive(Debug, Clone)]
pub struct ProposalDraftBuilder {
    draft: ProposalDraft,
}

impl ProposalDraftBuilder {
    /// Create a builder with an empty question, one-hour duration and 0.5 confidence.
    pub fn new() -> Self {
        Self {
            draft: ProposalDraft {
                question: String::new(),
                asset: String::new(),
                strike: Decimal::ONE,
                direction: Direction::Above,
                duration: Duration::hours(1),
                category: Category::Manual,
                confidence: Decimal::new(5, 1),
            },
        }
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.draft.question = question.into();
        self
    }

    pub fn asset(mut self, asset: impl Into<String>) -> Self {
        self.draft.asset = asset.into();
        self
    }

    pub fn strike(mut self, strike: Price) -> Self {
        self.draft.strike = strike;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.draft.direction = direction;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.draft.duration = duration;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.draft.category = category;
        self
    }

    pub fn confidence(mut self, confidence: Decimal) -> Self {
        self.draft.confidence = confidence;
        self
    }

    /// Finish building. Validation happens when the draft is submitted.
    pub fn build(self) -> ProposalDraft {
        self.draft
    }
}

impl Default for ProposalDraftBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable, registered market proposal.
#[derive(Debug, Clone)]
pub struct Proposal {
    id: ProposalId,
    question: String,
    asset: String,
    strike: Price,
    direction: Direction,
    duration: Duration,
    category: Category,
    confidence: Decimal,
    created_at: DateTime<Utc>,
}

impl Proposal {
    /// Build a proposal from an already-validated draft.
    pub fn from_draft(id: ProposalId, draft: ProposalDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            question: draft.question,
            asset: draft.asset,
            strike: draft.strike,
            direction: draft.direction,
            duration: draft.duration,
            category: draft.category,
            confidence: draft.confidence,
            created_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ProposalId {
        &self.id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn asset(&self) -> &str {
        &self.asset
    }

    #[must_use]
    pub fn strike(&self) -> Price {
        self.strike
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Scout confidence in `[0, 1]`.
    #[must_use]
    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When a market deployed from this proposal stops trading.
    #[must_use]
    pub fn resolves_at(&self) -> DateTime<Utc> {
        self.created_at + self.duration
    }

    #[must_use]
    pub fn key(&self) -> MarketKey {
        MarketKey {
            asset: self.asset.clone(),
            strike: self.strike,
            direction: self.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft() -> ProposalDraft {
        ProposalDraft::builder()
            .question("Will BTC/USD trade above 70000?")
            .asset("BTC/USD")
            .strike(dec!(70000))
            .build()
    }

    #[test]
    fn direction_above_includes_strike() {
        assert!(Direction::Above.resolves_yes(dec!(100), dec!(100)));
        assert!(!Direction::Above.resolves_yes(dec!(99.99), dec!(100)));
    }

    #[test]
    fn direction_below_excludes_strike() {
        assert!(!Direction::Below.resolves_yes(dec!(100), dec!(100)));
        assert!(Direction::Below.resolves_yes(dec!(99.99), dec!(100)));
    }

    #[test]
    fn valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn whitespace_question_rejected() {
        let mut d = draft();
        d.question = "   ".into();
        assert_eq!(d.validate(), Err(DomainError::EmptyQuestion));
    }

    #[test]
    fn zero_duration_rejected() {
        let mut d = draft();
        d.duration = Duration::zero();
        assert!(matches!(
            d.validate(),
            Err(DomainError::NonPositiveDuration { seconds: 0 })
        ));
    }

    #[test]
    fn oversized_duration_rejected() {
        let mut d = draft();
        d.duration = Duration::weeks(100_000_000);
        assert!(matches!(
            d.validate(),
            Err(DomainError::DurationTooLong { max_days: 365, .. })
        ));
        d.duration = Duration::days(MAX_DURATION_DAYS);
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn negative_strike_rejected() {
        let mut d = draft();
        d.strike = dec!(-1);
        assert!(matches!(d.validate(), Err(DomainError::NonPositiveStrike { .. })));
    }

    #[test]
    fn confidence_above_one_rejected() {
        let mut d = draft();
        d.confidence = dec!(1.2);
        assert!(matches!(
            d.validate(),
            Err(DomainError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn resolves_at_adds_duration() {
        let now = Utc::now();
        let p = Proposal::from_draft(ProposalId::new("p"), draft(), now);
        assert_eq!(p.resolves_at(), now + Duration::hours(1));
        assert_eq!(p.key(), draft().key());
    }
}
