use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::approval::ApprovalState;
use crate::domain::auction::{AuctionId, AuctionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    RequestApproval,
    User,
    Jewelry,
    Auction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RequestApproval => "request approval",
            Self::User => "user",
            Self::Jewelry => "jewelry",
            Self::Auction => "auction",
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown {kind} `{value}`")]
    UnknownValue { kind: &'static str, value: String },
    #[error("approval transition from {from} to {to} is not allowed")]
    IllegalTransition { from: ApprovalState, to: ApprovalState },
    #[error("auction {auction_id} is not open for bidding (state {state:?})")]
    AuctionNotOpen { auction_id: AuctionId, state: AuctionState },
    #[error("bid {offered} is below the minimum of {minimum}")]
    BidTooLow { offered: Decimal, minimum: Decimal },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} with id {id} not found")]
    NotFound { entity: EntityKind, id: i64 },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Rejected input: an unparseable value or a rule the input broke.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::Domain(
                DomainError::UnknownValue { .. }
                    | DomainError::BidTooLow { .. }
                    | DomainError::AuctionNotOpen { .. }
            )
        )
    }

    /// Stable machine-readable class, used by the CLI output envelope.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::IllegalTransition { .. }) => "illegal_transition",
            Self::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            Self::Domain(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::approval::ApprovalState;
    use crate::errors::{ApplicationError, DomainError, EntityKind};

    #[test]
    fn not_found_message_names_entity_and_id() {
        let error = ApplicationError::not_found(EntityKind::Jewelry, 99);
        assert_eq!(error.to_string(), "jewelry with id 99 not found");
        assert!(error.is_not_found());
        assert_eq!(error.class(), "not_found");
    }

    #[test]
    fn unknown_state_is_an_invalid_argument() {
        let error = ApplicationError::from(DomainError::UnknownValue {
            kind: "approval state",
            value: "PENDING".to_owned(),
        });
        assert!(error.is_invalid_argument());
        assert_eq!(error.class(), "invalid_argument");
    }

    #[test]
    fn illegal_transition_is_classified_apart_from_bad_input() {
        let error = ApplicationError::from(DomainError::IllegalTransition {
            from: ApprovalState::Rejected,
            to: ApprovalState::Approved,
        });

        assert!(!error.is_invalid_argument());
        assert_eq!(error.class(), "illegal_transition");
    }

    #[test]
    fn storage_and_configuration_failures_keep_their_class() {
        let persistence = ApplicationError::Persistence("database lock timeout".to_owned());
        assert_eq!(persistence.class(), "persistence");
        assert_eq!(persistence.to_string(), "persistence failure: database lock timeout");

        let configuration = ApplicationError::Configuration("bad transition table".to_owned());
        assert_eq!(configuration.class(), "configuration");
    }
}
