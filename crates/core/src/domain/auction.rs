use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::jewelry::JewelryId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuctionId(pub i64);

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BidId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionState {
    Waiting,
    Ongoing,
    Pause,
    Finished,
    Deleted,
}

impl AuctionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Ongoing => "ONGOING",
            Self::Pause => "PAUSE",
            Self::Finished => "FINISHED",
            Self::Deleted => "DELETED",
        }
    }
}

impl FromStr for AuctionState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WAITING" => Ok(Self::Waiting),
            "ONGOING" => Ok(Self::Ongoing),
            "PAUSE" => Ok(Self::Pause),
            "FINISHED" => Ok(Self::Finished),
            "DELETED" => Ok(Self::Deleted),
            _ => Err(DomainError::UnknownValue { kind: "auction state", value: value.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub name: String,
    pub jewelry_id: JewelryId,
    pub first_price: Decimal,
    pub price_step: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub state: AuctionState,
}

impl Auction {
    /// Lowest acceptable offer given the current highest bid. `None` when the
    /// next step would leave the decimal range, so no offer can clear it.
    pub fn minimum_bid(&self, highest: Option<Decimal>) -> Option<Decimal> {
        match highest {
            Some(highest) => highest.checked_add(self.price_step),
            None => Some(self.first_price),
        }
    }

    pub fn check_bid(&self, price: Decimal, highest: Option<Decimal>) -> Result<(), DomainError> {
        if self.state != AuctionState::Ongoing {
            return Err(DomainError::AuctionNotOpen { auction_id: self.id, state: self.state });
        }

        match self.minimum_bid(highest) {
            Some(minimum) if price >= minimum => Ok(()),
            Some(minimum) => Err(DomainError::BidTooLow { offered: price, minimum }),
            None => Err(DomainError::BidTooLow { offered: price, minimum: Decimal::MAX }),
        }
    }
}

/// A single entry of an auction's bidding history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub price_given: Decimal,
    pub time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBid {
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub price_given: Decimal,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{Auction, AuctionId, AuctionState};
    use crate::domain::jewelry::JewelryId;
    use crate::errors::DomainError;

    fn auction(state: AuctionState) -> Auction {
        let now = Utc::now();
        Auction {
            id: AuctionId(3),
            name: "Sapphire evening".to_string(),
            jewelry_id: JewelryId(42),
            first_price: Decimal::new(100, 0),
            price_step: Decimal::new(10, 0),
            start_date: now,
            end_date: now + Duration::hours(2),
            state,
        }
    }

    #[test]
    fn first_bid_must_reach_first_price() {
        let auction = auction(AuctionState::Ongoing);
        assert!(auction.check_bid(Decimal::new(100, 0), None).is_ok());
        assert!(matches!(
            auction.check_bid(Decimal::new(99, 0), None),
            Err(DomainError::BidTooLow { .. })
        ));
    }

    #[test]
    fn later_bids_must_add_a_price_step() {
        let auction = auction(AuctionState::Ongoing);
        let highest = Some(Decimal::new(150, 0));
        assert_eq!(auction.minimum_bid(highest), Some(Decimal::new(160, 0)));
        assert!(auction.check_bid(Decimal::new(159, 0), highest).is_err());
        assert!(auction.check_bid(Decimal::new(160, 0), highest).is_ok());
    }

    #[test]
    fn bids_are_refused_outside_ongoing_auctions() {
        let auction = auction(AuctionState::Finished);
        assert!(matches!(
            auction.check_bid(Decimal::new(500, 0), None),
            Err(DomainError::AuctionNotOpen { state: AuctionState::Finished, .. })
        ));
    }

    #[test]
    fn step_past_the_decimal_range_refuses_every_offer() {
        let auction = auction(AuctionState::Ongoing);
        let highest = Some(Decimal::MAX);
        assert_eq!(auction.minimum_bid(highest), None);
        match auction.check_bid(Decimal::MAX, highest) {
            Err(DomainError::BidTooLow { offered, minimum }) => {
                assert_eq!(offered, Decimal::MAX);
                assert_eq!(minimum, Decimal::MAX);
            }
            other => panic!("expected a too-low refusal, got {other:?}"),
        }
    }
}
