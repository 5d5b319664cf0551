use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};

use gavel_core::domain::approval::{NewRequestApproval, RequestApproval, RequestApprovalId};
use gavel_core::domain::auction::{Auction, AuctionId, Bid, NewBid};
use gavel_core::domain::jewelry::{Jewelry, JewelryId};
use gavel_core::domain::user::{User, UserId};

use super::{approval, auction, jewelry, user, RepositoryError, UnitOfWork, UnitOfWorkFactory};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlUnitOfWorkFactory {
    pool: DbPool,
}

impl SqlUnitOfWorkFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UnitOfWorkFactory for SqlUnitOfWorkFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqlUnitOfWork { tx }))
    }
}

/// Wraps one SQLite transaction. sqlx rolls it back when dropped uncommitted.
pub struct SqlUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait::async_trait]
impl UnitOfWork for SqlUnitOfWork {
    async fn find_request(
        &mut self,
        id: RequestApprovalId,
    ) -> Result<Option<RequestApproval>, RepositoryError> {
        approval::fetch_request(&mut *self.tx, id).await
    }

    async fn insert_request(
        &mut self,
        request: NewRequestApproval,
    ) -> Result<RequestApproval, RepositoryError> {
        approval::insert_request(&mut *self.tx, request).await
    }

    async fn update_request(&mut self, request: &RequestApproval) -> Result<(), RepositoryError> {
        approval::update_request(&mut *self.tx, request).await
    }

    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        user::fetch_user(&mut *self.tx, id).await
    }

    async fn find_jewelry(&mut self, id: JewelryId) -> Result<Option<Jewelry>, RepositoryError> {
        jewelry::fetch_jewelry(&mut *self.tx, id).await
    }

    async fn save_jewelry(&mut self, item: &Jewelry) -> Result<(), RepositoryError> {
        jewelry::upsert_jewelry(&mut *self.tx, item).await
    }

    async fn find_auction(&mut self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        auction::fetch_auction(&mut *self.tx, id).await
    }

    async fn highest_bid(
        &mut self,
        auction_id: AuctionId,
    ) -> Result<Option<Decimal>, RepositoryError> {
        auction::fetch_highest_bid(&mut *self.tx, auction_id).await
    }

    async fn insert_bid(&mut self, bid: NewBid) -> Result<Bid, RepositoryError> {
        auction::insert_bid(&mut *self.tx, bid).await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
