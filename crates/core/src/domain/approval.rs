use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::jewelry::JewelryId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestApprovalId(pub i64);

impl fmt::Display for RequestApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    Active,
    Approved,
    Rejected,
    Cancelled,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for ApprovalState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(DomainError::UnknownValue { kind: "approval state", value: value.to_string() }),
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation step of a jewelry item. Escalations create a new record
/// pointing at its predecessor through `parent_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestApproval {
    pub id: RequestApprovalId,
    pub parent_id: Option<RequestApprovalId>,
    pub state: ApprovalState,
    pub confirm: bool,
    pub sender_id: UserId,
    pub staff_id: Option<UserId>,
    pub responder_id: Option<UserId>,
    pub jewelry_id: JewelryId,
    pub desired_price: Decimal,
    pub valuation: Option<Decimal>,
    pub note: Option<String>,
    pub request_time: DateTime<Utc>,
    pub response_time: Option<DateTime<Utc>>,
}

impl RequestApproval {
    pub fn from_new(id: RequestApprovalId, new: NewRequestApproval) -> Self {
        Self {
            id,
            parent_id: new.parent_id,
            state: new.state,
            confirm: new.confirm,
            sender_id: new.sender_id,
            staff_id: new.staff_id,
            responder_id: None,
            jewelry_id: new.jewelry_id,
            desired_price: new.desired_price,
            valuation: new.valuation,
            note: None,
            request_time: new.request_time,
            response_time: None,
        }
    }

    /// Approved and signed off by the last responder.
    pub fn is_passed(&self) -> bool {
        self.state == ApprovalState::Approved && self.confirm
    }
}

/// A request that has not been assigned an id by the store yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRequestApproval {
    pub parent_id: Option<RequestApprovalId>,
    pub state: ApprovalState,
    pub confirm: bool,
    pub sender_id: UserId,
    pub staff_id: Option<UserId>,
    pub jewelry_id: JewelryId,
    pub desired_price: Decimal,
    pub valuation: Option<Decimal>,
    pub request_time: DateTime<Utc>,
}
