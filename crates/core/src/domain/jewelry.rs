use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JewelryId(pub i64);

impl fmt::Display for JewelryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JewelryState {
    Active,
    Approving,
    Auction,
    Hidden,
}

impl JewelryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Approving => "APPROVING",
            Self::Auction => "AUCTION",
            Self::Hidden => "HIDDEN",
        }
    }
}

impl FromStr for JewelryState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "APPROVING" => Ok(Self::Approving),
            "AUCTION" => Ok(Self::Auction),
            "HIDDEN" => Ok(Self::Hidden),
            _ => Err(DomainError::UnknownValue { kind: "jewelry state", value: value.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jewelry {
    pub id: JewelryId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub material: String,
    pub brand: String,
    pub weight: Decimal,
    pub price: Decimal,
    pub state: JewelryState,
    pub owner_id: UserId,
}

impl Jewelry {
    /// Takes the item off every public listing.
    pub fn hide(&mut self) {
        self.state = JewelryState::Hidden;
    }
}
