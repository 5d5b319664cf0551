use std::error::Error;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use gavel_core::domain::approval::ApprovalState;
use gavel_core::domain::jewelry::{JewelryId, JewelryState};
use gavel_core::domain::user::UserId;
use gavel_core::workflow::WorkflowPolicy;
use gavel_db::fixtures::{
    ReferenceDataset, EMERALD_RING, MEMBER_ALICE, SAPPHIRE_PENDANT, STAFF_SAM,
};
use gavel_db::repositories::{JewelryRepository, SqlJewelryRepository};
use gavel_db::services::{CancelApprovalRequest, UserApprovalRequest};
use gavel_db::{connect_with_settings, migrations, DbPool, RequestApprovalService};

type ContractResult<T = ()> = Result<T, Box<dyn Error>>;

async fn file_backed_pool(dir: &tempfile::TempDir) -> ContractResult<DbPool> {
    let url = format!("sqlite://{}", dir.path().join("gavel.db").display());
    let pool = connect_with_settings(&url, 4, 30).await?;
    migrations::run_pending(&pool).await?;
    ReferenceDataset::load(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn member_request_matches_the_documented_shape() -> ContractResult {
    let dir = tempfile::tempdir()?;
    let pool = file_backed_pool(&dir).await?;
    let service = RequestApprovalService::sqlite(pool, WorkflowPolicy::default());
    let t0 = Utc::now() - Duration::minutes(1);

    let created = service
        .create_from_user(UserApprovalRequest {
            sender_id: UserId(MEMBER_ALICE),
            jewelry_id: JewelryId(EMERALD_RING),
            request_time: t0,
        })
        .await?;

    let json: Value = serde_json::to_value(&created)?;
    assert_eq!(json["state"], "ACTIVE");
    assert_eq!(json["confirm"], false);
    assert_eq!(json["staff_id"], Value::Null);
    assert_eq!(created.desired_price, Decimal::new(1000, 1));
    Ok(())
}

#[tokio::test]
async fn staff_decision_survives_a_fresh_connection() -> ContractResult {
    let dir = tempfile::tempdir()?;
    let pool = file_backed_pool(&dir).await?;
    let service = RequestApprovalService::sqlite(pool.clone(), WorkflowPolicy::default());
    let created = service
        .create_from_user(UserApprovalRequest {
            sender_id: UserId(MEMBER_ALICE),
            jewelry_id: JewelryId(EMERALD_RING),
            request_time: Utc::now(),
        })
        .await?;
    let before = Utc::now();
    service.set_state(created.id, UserId(STAFF_SAM), "APPROVED").await?;
    pool.close().await;

    let reopened = file_backed_pool(&dir).await?;
    let service = RequestApprovalService::sqlite(reopened, WorkflowPolicy::default());
    let stored = service.get_request_by_id(created.id).await?;

    assert_eq!(stored.state, ApprovalState::Approved);
    assert!(!stored.confirm);
    assert_eq!(stored.staff_id, Some(UserId(STAFF_SAM)));
    assert_eq!(stored.responder_id, Some(UserId(STAFF_SAM)));
    let responded = stored.response_time.ok_or("response time missing")?;
    assert!(responded >= before);
    Ok(())
}

#[tokio::test]
async fn cancel_hides_jewelry_and_leaves_state() -> ContractResult {
    let dir = tempfile::tempdir()?;
    let pool = file_backed_pool(&dir).await?;
    let service = RequestApprovalService::sqlite(pool.clone(), WorkflowPolicy::default());
    let created = service
        .create_from_user(UserApprovalRequest {
            sender_id: UserId(MEMBER_ALICE),
            jewelry_id: JewelryId(SAPPHIRE_PENDANT),
            request_time: Utc::now(),
        })
        .await?;

    let cancelled = service
        .cancel(CancelApprovalRequest { request_id: created.id, note: "damaged".to_string() })
        .await?;

    assert_eq!(cancelled.note.as_deref(), Some("damaged"));
    assert_eq!(cancelled.state, created.state);
    let pendant = SqlJewelryRepository::new(pool)
        .find_by_id(JewelryId(SAPPHIRE_PENDANT))
        .await?
        .ok_or("pendant missing")?;
    assert_eq!(pendant.state, JewelryState::Hidden);
    Ok(())
}
