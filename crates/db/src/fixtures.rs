use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use gavel_core::domain::auction::{Auction, AuctionId, AuctionState};
use gavel_core::domain::jewelry::{Jewelry, JewelryId, JewelryState};
use gavel_core::domain::user::{AccountState, Role, User, UserId};

use crate::connection::DbPool;
use crate::repositories::{
    auction, jewelry, user, AuctionRepository, InMemoryStore, JewelryRepository, RepositoryError,
    UserRepository,
};

pub const MEMBER_ALICE: i64 = 1;
pub const MEMBER_BOB: i64 = 2;
pub const STAFF_SAM: i64 = 5;
pub const MANAGER_MAYA: i64 = 9;
pub const ADMIN_ADA: i64 = 10;

pub const EMERALD_RING: i64 = 42;
pub const DIAMOND_BROOCH: i64 = 77;
pub const SAPPHIRE_PENDANT: i64 = 99;

pub const SAPPHIRE_AUCTION: i64 = 3;
pub const BROOCH_PREVIEW_AUCTION: i64 = 4;

const FIXTURE_USER_IDS: &str = "(1, 2, 5, 9, 10)";
const FIXTURE_JEWELRY_IDS: &str = "(42, 77, 99)";
const FIXTURE_AUCTION_IDS: &str = "(3, 4)";

/// Deterministic users, jewelry and auctions the workflow can run against.
///
/// Ids are fixed so tests and CLI walkthroughs can refer to them directly.
pub struct ReferenceDataset;

impl ReferenceDataset {
    pub fn users() -> Vec<User> {
        [
            (MEMBER_ALICE, "alice", "Alice Moreau", Role::Member),
            (MEMBER_BOB, "bob", "Bob Okafor", Role::Member),
            (STAFF_SAM, "sam", "Sam Whitaker", Role::Staff),
            (MANAGER_MAYA, "maya", "Maya Castellanos", Role::Manager),
            (ADMIN_ADA, "ada", "Ada Brennan", Role::Admin),
        ]
        .into_iter()
        .map(|(id, username, full_name, role)| User {
            id: UserId(id),
            username: username.to_string(),
            full_name: full_name.to_string(),
            email: format!("{username}@gavel.example"),
            role,
            state: AccountState::Active,
        })
        .collect()
    }

    pub fn jewelry() -> Vec<Jewelry> {
        vec![
            Jewelry {
                id: JewelryId(EMERALD_RING),
                name: "Emerald solitaire ring".to_string(),
                description: "Colombian emerald in an 18k yellow gold setting".to_string(),
                category: "ring".to_string(),
                material: "gold".to_string(),
                brand: "Maison Verte".to_string(),
                weight: Decimal::new(46, 1),
                price: Decimal::new(1000, 1),
                state: JewelryState::Active,
                owner_id: UserId(MEMBER_ALICE),
            },
            Jewelry {
                id: JewelryId(DIAMOND_BROOCH),
                name: "Art deco diamond brooch".to_string(),
                description: "Platinum brooch, old european cut diamonds".to_string(),
                category: "brooch".to_string(),
                material: "platinum".to_string(),
                brand: "Unsigned".to_string(),
                weight: Decimal::new(121, 1),
                price: Decimal::new(2_500, 0),
                state: JewelryState::Approving,
                owner_id: UserId(MEMBER_BOB),
            },
            Jewelry {
                id: JewelryId(SAPPHIRE_PENDANT),
                name: "Ceylon sapphire pendant".to_string(),
                description: "Cushion sapphire on a white gold chain".to_string(),
                category: "pendant".to_string(),
                material: "white gold".to_string(),
                brand: "Halden & Co".to_string(),
                weight: Decimal::new(38, 1),
                price: Decimal::new(80_000, 2),
                state: JewelryState::Auction,
                owner_id: UserId(MEMBER_BOB),
            },
        ]
    }

    pub fn auctions() -> Vec<Auction> {
        vec![
            Auction {
                id: AuctionId(SAPPHIRE_AUCTION),
                name: "Spring sapphire evening".to_string(),
                jewelry_id: JewelryId(SAPPHIRE_PENDANT),
                first_price: Decimal::new(80_000, 2),
                price_step: Decimal::new(2_500, 2),
                start_date: fixed_time(2026, 4, 2, 18),
                end_date: fixed_time(2026, 4, 2, 21),
                state: AuctionState::Ongoing,
            },
            Auction {
                id: AuctionId(BROOCH_PREVIEW_AUCTION),
                name: "Art deco preview".to_string(),
                jewelry_id: JewelryId(DIAMOND_BROOCH),
                first_price: Decimal::new(2_500, 0),
                price_step: Decimal::new(100, 0),
                start_date: fixed_time(2026, 5, 10, 17),
                end_date: fixed_time(2026, 5, 10, 20),
                state: AuctionState::Waiting,
            },
        ]
    }

    /// Upserts the dataset in one transaction. Safe to run repeatedly.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let users = Self::users();
        let items = Self::jewelry();
        let auctions = Self::auctions();

        let mut tx = pool.begin().await?;
        for record in &users {
            user::upsert_user(&mut *tx, record).await?;
        }
        for record in &items {
            jewelry::upsert_jewelry(&mut *tx, record).await?;
        }
        for record in &auctions {
            auction::upsert_auction(&mut *tx, record).await?;
        }
        tx.commit().await?;

        Ok(SeedResult { users: users.len(), jewelry: items.len(), auctions: auctions.len() })
    }

    pub async fn load_into(store: &InMemoryStore) -> Result<SeedResult, RepositoryError> {
        let users = Self::users();
        let items = Self::jewelry();
        let auctions = Self::auctions();
        let result =
            SeedResult { users: users.len(), jewelry: items.len(), auctions: auctions.len() };

        for record in users {
            UserRepository::save(store, record).await?;
        }
        for record in items {
            JewelryRepository::save(store, record).await?;
        }
        for record in auctions {
            AuctionRepository::save(store, record).await?;
        }
        Ok(result)
    }

    /// Checks that every fixture record is present.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();
        for record in Self::users() {
            let present = user::fetch_user(pool, record.id).await?.is_some();
            checks.push((format!("user-{}", record.id), present));
        }
        for record in Self::jewelry() {
            let present = jewelry::fetch_jewelry(pool, record.id).await?.is_some();
            checks.push((format!("jewelry-{}", record.id), present));
        }
        for record in Self::auctions() {
            let present = auction::fetch_auction(pool, record.id).await?.is_some();
            checks.push((format!("auction-{}", record.id), present));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the fixtures along with every request and bid that points at them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM auction_history
             WHERE auction_id IN {FIXTURE_AUCTION_IDS} OR user_id IN {FIXTURE_USER_IDS}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM auction WHERE id IN {FIXTURE_AUCTION_IDS}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM request_approval
             WHERE jewelry_id IN {FIXTURE_JEWELRY_IDS} OR sender_id IN {FIXTURE_USER_IDS}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM jewelry WHERE id IN {FIXTURE_JEWELRY_IDS}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM users WHERE id IN {FIXTURE_USER_IDS}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn fixed_time(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).single().unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub users: usize,
    pub jewelry: usize,
    pub auctions: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
