use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use gavel_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use gavel_core::domain::auction::{Auction, AuctionId, Bid, NewBid};
use gavel_core::domain::page::{Page, PageRequest};
use gavel_core::domain::stored_precision;
use gavel_core::domain::user::UserId;
use gavel_core::errors::{ApplicationError, EntityKind};

use super::{correlation_id, DEFAULT_MAX_PAGE_SIZE};
use crate::repositories::{
    AuctionRepository, InMemoryStore, SqlAuctionRepository, SqlUnitOfWorkFactory,
    UnitOfWorkFactory,
};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceBidRequest {
    pub user_id: UserId,
    pub auction_id: AuctionId,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

/// Records bids in an auction's history and answers history queries.
pub struct BiddingService {
    units: Arc<dyn UnitOfWorkFactory>,
    auctions: Arc<dyn AuctionRepository>,
    audit: Arc<dyn AuditSink>,
    max_page_size: u32,
}

impl BiddingService {
    pub fn new(units: Arc<dyn UnitOfWorkFactory>, auctions: Arc<dyn AuctionRepository>) -> Self {
        Self {
            units,
            auctions,
            audit: Arc::new(NoopAuditSink),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self::new(
            Arc::new(SqlUnitOfWorkFactory::new(pool.clone())),
            Arc::new(SqlAuctionRepository::new(pool)),
        )
    }

    pub fn in_memory(store: InMemoryStore) -> Self {
        Self::new(Arc::new(store.clone()), Arc::new(store))
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// Accepts a bid when the auction is ONGOING and the price clears the
    /// current minimum.
    pub async fn place_bid(&self, input: PlaceBidRequest) -> Result<Bid, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let bidder = unit
            .find_user(input.user_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::User, input.user_id.0))?;
        let auction = unit
            .find_auction(input.auction_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Auction, input.auction_id.0))?;
        let highest = unit.highest_bid(auction.id).await?;

        if let Err(error) = auction.check_bid(input.price, highest) {
            warn!(
                event_name = "bidding.bid.rejected",
                correlation_id = %correlation_id,
                auction_id = %auction.id,
                user_id = %bidder.id,
                price = %input.price,
                reason = %error,
                "bid rejected"
            );
            self.audit.emit(
                AuditEvent::new(
                    Some(auction.id.0),
                    &correlation_id,
                    "bidding.bid_rejected",
                    AuditCategory::Bidding,
                    Some(bidder.id),
                    AuditOutcome::Rejected,
                )
                .with_metadata("price", input.price.to_string())
                .with_metadata(
                    "minimum",
                    auction
                        .minimum_bid(highest)
                        .map_or_else(|| "out of range".to_owned(), |minimum| minimum.to_string()),
                ),
            );
            return Err(error.into());
        }

        let bid = unit
            .insert_bid(NewBid {
                auction_id: auction.id,
                user_id: bidder.id,
                price_given: input.price,
                time: stored_precision(input.time),
            })
            .await?;
        unit.commit().await?;

        info!(
            event_name = "bidding.bid.placed",
            correlation_id = %correlation_id,
            auction_id = %auction.id,
            user_id = %bidder.id,
            price = %bid.price_given,
            "bid placed"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(auction.id.0),
                &correlation_id,
                "bidding.bid_placed",
                AuditCategory::Bidding,
                Some(bidder.id),
                AuditOutcome::Success,
            )
            .with_metadata("price", bid.price_given.to_string()),
        );

        Ok(bid)
    }

    pub async fn list_by_auction(
        &self,
        auction_id: AuctionId,
        page: PageRequest,
    ) -> Result<Page<Bid>, ApplicationError> {
        self.require_auction(auction_id).await?;
        Ok(self.auctions.list_bids_by_auction(auction_id, page.clamped(self.max_page_size)).await?)
    }

    pub async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Bid>, ApplicationError> {
        Ok(self.auctions.list_bids_by_user(user_id, page.clamped(self.max_page_size)).await?)
    }

    /// Highest price offered so far, `None` before the first bid.
    pub async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Decimal>, ApplicationError> {
        self.require_auction(auction_id).await?;
        Ok(self.auctions.highest_bid(auction_id).await?)
    }

    async fn require_auction(&self, auction_id: AuctionId) -> Result<Auction, ApplicationError> {
        self.auctions
            .find_by_id(auction_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Auction, auction_id.0))
    }
}
