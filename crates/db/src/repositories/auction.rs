use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use rust_decimal::Decimal;

use gavel_core::domain::auction::{Auction, AuctionId, Bid, BidId, NewBid};
use gavel_core::domain::jewelry::JewelryId;
use gavel_core::domain::page::{Page, PageRequest};
use gavel_core::domain::user::UserId;

use super::{
    decode_error, format_timestamp, page_bounds, parse_decimal, parse_enum, parse_timestamp,
    AuctionRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlAuctionRepository {
    pool: DbPool,
}

impl SqlAuctionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn list_bids_where(
        &self,
        column: &str,
        value: i64,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError> {
        let (limit, offset) = page_bounds(&page);
        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM auction_history WHERE {column} = ?"
        ))
        .bind(value)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")
        .map_err(decode_error)?;

        let rows = sqlx::query(&format!(
            "SELECT id, price_given, time, user_id, auction_id FROM auction_history
             WHERE {column} = ? ORDER BY time {order}, id {order} LIMIT ? OFFSET ?",
            order = page.sort.as_sql()
        ))
        .bind(value)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let items = rows.iter().map(row_to_bid).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, page, u64::try_from(total).unwrap_or_default()))
    }
}

fn row_to_auction(row: &SqliteRow) -> Result<Auction, RepositoryError> {
    let first_price: String = row.try_get("first_price").map_err(decode_error)?;
    let price_step: String = row.try_get("price_step").map_err(decode_error)?;
    let start_date: String = row.try_get("start_date").map_err(decode_error)?;
    let end_date: String = row.try_get("end_date").map_err(decode_error)?;
    let state: String = row.try_get("state").map_err(decode_error)?;

    Ok(Auction {
        id: AuctionId(row.try_get("id").map_err(decode_error)?),
        name: row.try_get("name").map_err(decode_error)?,
        jewelry_id: JewelryId(row.try_get("jewelry_id").map_err(decode_error)?),
        first_price: parse_decimal("first_price", &first_price)?,
        price_step: parse_decimal("price_step", &price_step)?,
        start_date: parse_timestamp("start_date", &start_date)?,
        end_date: parse_timestamp("end_date", &end_date)?,
        state: parse_enum("state", &state)?,
    })
}

fn row_to_bid(row: &SqliteRow) -> Result<Bid, RepositoryError> {
    let price_given: String = row.try_get("price_given").map_err(decode_error)?;
    let time: String = row.try_get("time").map_err(decode_error)?;

    Ok(Bid {
        id: BidId(row.try_get("id").map_err(decode_error)?),
        auction_id: AuctionId(row.try_get("auction_id").map_err(decode_error)?),
        user_id: UserId(row.try_get("user_id").map_err(decode_error)?),
        price_given: parse_decimal("price_given", &price_given)?,
        time: parse_timestamp("time", &time)?,
    })
}

pub(crate) async fn fetch_auction<'e, E>(
    executor: E,
    id: AuctionId,
) -> Result<Option<Auction>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, name, jewelry_id, first_price, price_step, start_date, end_date, state
         FROM auction WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_auction).transpose()
}

pub(crate) async fn upsert_auction<'e, E>(executor: E, auction: &Auction) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO auction (id, name, jewelry_id, first_price, price_step, start_date,
                              end_date, state)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             jewelry_id = excluded.jewelry_id,
             first_price = excluded.first_price,
             price_step = excluded.price_step,
             start_date = excluded.start_date,
             end_date = excluded.end_date,
             state = excluded.state",
    )
    .bind(auction.id.0)
    .bind(&auction.name)
    .bind(auction.jewelry_id.0)
    .bind(auction.first_price.to_string())
    .bind(auction.price_step.to_string())
    .bind(format_timestamp(&auction.start_date))
    .bind(format_timestamp(&auction.end_date))
    .bind(auction.state.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// Prices are TEXT, so the maximum is taken after decoding rather than in SQL.
pub(crate) async fn fetch_highest_bid<'e, E>(
    executor: E,
    auction_id: AuctionId,
) -> Result<Option<Decimal>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let prices: Vec<String> =
        sqlx::query_scalar("SELECT price_given FROM auction_history WHERE auction_id = ?")
            .bind(auction_id.0)
            .fetch_all(executor)
            .await?;

    let mut highest: Option<Decimal> = None;
    for price in prices {
        let price = parse_decimal("price_given", &price)?;
        highest = Some(highest.map_or(price, |current| current.max(price)));
    }
    Ok(highest)
}

pub(crate) async fn insert_bid<'e, E>(executor: E, bid: NewBid) -> Result<Bid, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO auction_history (price_given, time, user_id, auction_id) VALUES (?, ?, ?, ?)",
    )
    .bind(bid.price_given.to_string())
    .bind(format_timestamp(&bid.time))
    .bind(bid.user_id.0)
    .bind(bid.auction_id.0)
    .execute(executor)
    .await?;

    Ok(Bid {
        id: BidId(result.last_insert_rowid()),
        auction_id: bid.auction_id,
        user_id: bid.user_id,
        price_given: bid.price_given,
        time: bid.time,
    })
}

#[async_trait::async_trait]
impl AuctionRepository for SqlAuctionRepository {
    async fn find_by_id(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError> {
        fetch_auction(&self.pool, id).await
    }

    async fn save(&self, auction: Auction) -> Result<(), RepositoryError> {
        upsert_auction(&self.pool, &auction).await
    }

    async fn highest_bid(&self, auction_id: AuctionId) -> Result<Option<Decimal>, RepositoryError> {
        fetch_highest_bid(&self.pool, auction_id).await
    }

    async fn list_bids_by_auction(
        &self,
        auction_id: AuctionId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError> {
        self.list_bids_where("auction_id", auction_id.0, page).await
    }

    async fn list_bids_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Bid>, RepositoryError> {
        self.list_bids_where("user_id", user_id.0, page).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use gavel_core::domain::auction::{AuctionId, AuctionState, NewBid};
    use gavel_core::domain::page::{PageRequest, SortOrder};
    use gavel_core::domain::user::UserId;

    use super::{insert_bid, SqlAuctionRepository};
    use crate::repositories::AuctionRepository;
    use crate::{connect_with_settings, fixtures, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::ReferenceDataset::load(&pool).await.expect("reference data");
        pool
    }

    fn bid(user: i64, cents: i64, minute: i64) -> NewBid {
        NewBid {
            auction_id: AuctionId(fixtures::SAPPHIRE_AUCTION),
            user_id: UserId(user),
            price_given: Decimal::new(cents, 2),
            time: Utc.with_ymd_and_hms(2026, 4, 2, 18, 0, 0).single().expect("time")
                + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn highest_bid_compares_decimals_not_text() {
        let pool = setup().await;
        let repo = SqlAuctionRepository::new(pool.clone());
        let auction = AuctionId(fixtures::SAPPHIRE_AUCTION);
        assert_eq!(repo.highest_bid(auction).await.expect("none yet"), None);

        insert_bid(&pool, bid(fixtures::MEMBER_ALICE, 90_000, 0)).await.expect("bid 1");
        insert_bid(&pool, bid(fixtures::MEMBER_BOB, 100_000, 1)).await.expect("bid 2");

        assert_eq!(repo.highest_bid(auction).await.expect("highest"), Some(Decimal::new(1_000, 0)));
    }

    #[tokio::test]
    async fn bid_history_pages_by_auction_and_user() {
        let pool = setup().await;
        let repo = SqlAuctionRepository::new(pool.clone());
        insert_bid(&pool, bid(fixtures::MEMBER_ALICE, 90_000, 0)).await.expect("bid 1");
        insert_bid(&pool, bid(fixtures::MEMBER_BOB, 95_000, 1)).await.expect("bid 2");
        insert_bid(&pool, bid(fixtures::MEMBER_ALICE, 100_000, 2)).await.expect("bid 3");

        let history = repo
            .list_bids_by_auction(
                AuctionId(fixtures::SAPPHIRE_AUCTION),
                PageRequest::default().with_sort(SortOrder::OldestFirst),
            )
            .await
            .expect("history");
        assert_eq!(history.total_items, 3);
        assert_eq!(history.items[0].price_given, Decimal::new(90_000, 2));

        let alice = repo
            .list_bids_by_user(UserId(fixtures::MEMBER_ALICE), PageRequest::new(0, 1))
            .await
            .expect("alice");
        assert_eq!(alice.total_items, 2);
        assert_eq!(alice.total_pages, 2);
        assert_eq!(alice.items[0].price_given, Decimal::new(100_000, 2));
    }

    #[tokio::test]
    async fn save_updates_auction_state() {
        let repo = SqlAuctionRepository::new(setup().await);
        let mut auction = repo
            .find_by_id(AuctionId(fixtures::SAPPHIRE_AUCTION))
            .await
            .expect("find")
            .expect("seeded");
        auction.state = AuctionState::Finished;
        repo.save(auction.clone()).await.expect("save");

        assert_eq!(repo.find_by_id(auction.id).await.expect("find"), Some(auction));
    }
}
