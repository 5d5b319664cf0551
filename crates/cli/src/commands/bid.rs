use chrono::Utc;
use clap::Subcommand;
use gavel_core::config::AppConfig;
use gavel_core::domain::auction::AuctionId;
use gavel_core::domain::user::UserId;
use gavel_core::errors::ApplicationError;
use gavel_db::services::PlaceBidRequest;
use gavel_db::BiddingService;
use rust_decimal::Decimal;
use serde_json::json;

use crate::commands::{open_database, preflight, CommandResult, PageArgs, Preflight};

#[derive(Debug, Clone, Subcommand)]
pub enum BidCommand {
    #[command(about = "Place a bid on an ongoing auction")]
    Place {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        auction: i64,
        #[arg(long)]
        price: Decimal,
    },
    #[command(about = "List the bid history of an auction")]
    ListAuction {
        #[arg(long)]
        auction: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "List the bids a user has placed")]
    ListUser {
        #[arg(long)]
        user: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Show the highest bid on an auction")]
    Highest {
        #[arg(long)]
        auction: i64,
    },
}

impl BidCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Place { .. } => "bid.place",
            Self::ListAuction { .. } => "bid.list-auction",
            Self::ListUser { .. } => "bid.list-user",
            Self::Highest { .. } => "bid.highest",
        }
    }
}

pub fn run(command: BidCommand) -> CommandResult {
    let name = command.name();
    let Preflight { config, runtime } = match preflight(name) {
        Ok(preflight) => preflight,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_database(name, &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let service =
            BiddingService::sqlite(pool.clone()).with_max_page_size(config.pagination.max_page_size);

        let result = execute(&service, &config, command).await;
        pool.close().await;

        result.unwrap_or_else(|error| CommandResult::from_application_error(name, &error))
    })
}

async fn execute(
    service: &BiddingService,
    config: &AppConfig,
    command: BidCommand,
) -> Result<CommandResult, ApplicationError> {
    let name = command.name();
    let result = match command {
        BidCommand::Place { user, auction, price } => {
            let bid = service
                .place_bid(PlaceBidRequest {
                    user_id: UserId(user),
                    auction_id: AuctionId(auction),
                    price,
                    time: Utc::now(),
                })
                .await?;
            CommandResult::success_with_data(
                name,
                format!("bid {} of {} placed on auction {auction}", bid.id.0, bid.price_given),
                &bid,
            )
        }
        BidCommand::ListAuction { auction, page } => {
            let listed =
                service.list_by_auction(AuctionId(auction), page.to_request(config)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} bid(s) on auction {auction}", listed.total_items),
                &listed,
            )
        }
        BidCommand::ListUser { user, page } => {
            let listed = service.list_by_user(UserId(user), page.to_request(config)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} bid(s) placed by user {user}", listed.total_items),
                &listed,
            )
        }
        BidCommand::Highest { auction } => {
            let highest = service.highest_bid(AuctionId(auction)).await?;
            let message = match highest {
                Some(price) => format!("highest bid on auction {auction} is {price}"),
                None => format!("auction {auction} has no bids yet"),
            };
            CommandResult::success_with_data(name, message, &json!({ "highest_bid": highest }))
        }
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use gavel_core::config::AppConfig;
    use gavel_db::fixtures::{ReferenceDataset, MEMBER_ALICE, SAPPHIRE_AUCTION};
    use gavel_db::{BiddingService, InMemoryStore};
    use rust_decimal::Decimal;
    use serde_json::Value;

    use super::{execute, BidCommand};

    #[tokio::test]
    async fn highest_is_empty_until_the_first_bid() {
        let store = InMemoryStore::new();
        ReferenceDataset::load_into(&store).await.expect("reference data");
        let service = BiddingService::in_memory(store);
        let config = AppConfig::default();

        let before = execute(&service, &config, BidCommand::Highest { auction: SAPPHIRE_AUCTION })
            .await
            .expect("highest");
        let body: Value = serde_json::from_str(&before.output).expect("json");
        assert!(body["data"]["highest_bid"].is_null());

        execute(
            &service,
            &config,
            BidCommand::Place {
                user: MEMBER_ALICE,
                auction: SAPPHIRE_AUCTION,
                price: Decimal::new(81_000, 2),
            },
        )
        .await
        .expect("place");

        let after = execute(&service, &config, BidCommand::Highest { auction: SAPPHIRE_AUCTION })
            .await
            .expect("highest");
        let body: Value = serde_json::from_str(&after.output).expect("json");
        assert_eq!(body["message"], "highest bid on auction 3 is 810.00");
    }
}
