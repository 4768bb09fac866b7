//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new id from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Proposal identifier.
    ///
    /// Fresh ids are random (`uuid` v4); tests may construct fixed ones.
    ProposalId
);

string_id!(
    /// Market identifier, derived 1:1 from the approving proposal.
    MarketId
);

string_id!(
    /// Identity of a voting evaluator.
    EvaluatorId
);

string_id!(
    /// Identity of a position holder in a market.
    HolderId
);

impl ProposalId {
    /// Generate a fresh random proposal id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("prop-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl MarketId {
    /// The market id a given proposal deploys to.
    #[must_use]
    pub fn for_proposal(proposal: &ProposalId) -> Self {
        let raw = proposal.as_str();
        let suffix = raw.strip_prefix("prop-").unwrap_or(raw);
        Self(format!("mkt-{suffix}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_id_generate_is_unique() {
        let a = ProposalId::generate();
        let b = ProposalId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("prop-"));
    }

    #[test]
    fn market_id_for_proposal_keeps_suffix() {
        let id = MarketId::for_proposal(&ProposalId::new("prop-abc"));
        assert_eq!(id.as_str(), "mkt-abc");

        let id = MarketId::for_proposal(&ProposalId::new("custom"));
        assert_eq!(id.as_str(), "mkt-custom");
    }

    #[test]
    fn evaluator_id_display() {
        let id = EvaluatorId::from("risk");
        assert_eq!(format!("{}", id), "risk");
    }

    #[test]
    fn holder_id_from_string() {
        let id = HolderId::from("alice".to_string());
        assert_eq!(id.as_str(), "alice");
    }
}
