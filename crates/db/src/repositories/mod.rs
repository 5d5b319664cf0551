use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use gavel_core::domain::approval::{NewRequestApproval, RequestApproval, RequestApprovalId};
use gavel_core::domain::auction::{Auction, AuctionId, Bid, NewBid};
use gavel_core::domain::jewelry::{Jewelry, JewelryId};
use gavel_core::domain::page::{Page, PageRequest};
use gavel_core::domain::user::{Role, User, UserId};
use gavel_core::errors::ApplicationError;

pub mod approval;
pub mod auction;
pub mod jewelry;
pub mod memory;
pub mod unit_of_work;
pub mod user;

pub use approval::SqlRequestApprovalRepository;
pub use auction::SqlAuctionRepository;
pub use jewelry::SqlJewelryRepository;
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use unit_of_work::{SqlUnitOfWork, SqlUnitOfWorkFactory};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait JewelryRepository: Send + Sync {
    async fn find_by_id(&self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError>;
    async fn save(&self, jewelry: Jewelry) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequestApprovalRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError>;

    async fn insert(&self, request: NewRequestApproval) -> Result<RequestApproval, RepositoryError>;

    async fn update(&self, request: &RequestApproval) -> Result<(), RepositoryError>;

    /// Requests whose sender holds `role`.
    async fn list_by_sender_role(
        &self,
        role: Role,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError>;

    /// Requests sent by `user_id`.
    async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, RepositoryError>;

    /// Requests that are approved and confirmed.
    async fn list_passed(&self, page: PageRequest)
        -> Result<Page<RequestApproval>, RepositoryError>;
}

#[async_trait]
pub trait AuctionRepository: Send + Sync {
    async fn find_by_id(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError>;
    async fn save(&self, auction: Auction) -> Result<(), RepositoryError>;
    async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Decimal>, RepositoryError>;
    async fn list_bids_by_auction(
        &self,
        auction_id: AuctionId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError>;
    async fn list_bids_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError>;
}

/// A transaction scope. Everything written through it becomes visible only on
/// `commit`; dropping it uncommitted discards the writes.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_request(
        &mut self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError>;
    async fn insert_request(
        &mut self,
        request: NewRequestApproval,
    ) -> Result<RequestApproval, RepositoryError>;
    async fn update_request(&mut self, request: &RequestApproval) -> Result<(), RepositoryError>;
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_jewelry(&mut self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError>;
    async fn save_jewelry(&mut self, jewelry: &Jewelry) -> Result<(), RepositoryError>;
    async fn find_auction(&mut self, id: AuctionId) -> Result<Option<Auction>, RepositoryError>;
    async fn highest_bid(&mut self, auction_id: AuctionId)
        -> Result<Option<Decimal>, RepositoryError>;
    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, RepositoryError>;
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

// Timestamps are stored with a fixed width so text ordering matches time ordering.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

pub(crate) fn parse_enum<T>(field: &str, value: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|error| RepositoryError::Decode(format!("{field}: {error}")))
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn page_bounds(page: &PageRequest) -> (i64, i64) {
    let limit = i64::from(page.size.max(1));
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}
