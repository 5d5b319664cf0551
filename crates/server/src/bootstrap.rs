use std::sync::Arc;

use gavel_core::config::{AppConfig, ConfigError, LoadOptions};
use gavel_db::services::TracingAuditSink;
use gavel_db::{connect_with_config, migrations, DbPool, RequestApprovalService};
use thiserror::Error;
use tracing::info;

/// What the server runs on. Bidding has no server-side consumer yet, so only
/// the approval workflow is wired here; the CLI builds its own services.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub approvals: RequestApprovalService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let policy = config.workflow_policy()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let approvals = RequestApprovalService::sqlite(db_pool.clone(), policy)
        .with_audit_sink(Arc::new(TracingAuditSink))
        .with_max_page_size(config.pagination.max_page_size);
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        "approval workflow wired"
    );

    Ok(Application { config, db_pool, approvals })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gavel_core::config::{ConfigOverrides, LoadOptions};
    use gavel_core::domain::approval::ApprovalState;
    use gavel_core::domain::jewelry::JewelryId;
    use gavel_core::domain::user::UserId;
    use gavel_core::workflow::CancelBehavior;
    use gavel_db::fixtures::{ReferenceDataset, EMERALD_RING, MEMBER_ALICE, STAFF_SAM};
    use gavel_db::services::UserApprovalRequest;

    use crate::bootstrap::bootstrap;

    fn options(database_url: String, transitions: Option<Vec<String>>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url),
                allowed_transitions: transitions,
                cancel_behavior: Some(CancelBehavior::MarkCancelled),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    fn temp_database_url(dir: &tempfile::TempDir) -> String {
        format!("sqlite://{}", dir.path().join("gavel.db").display())
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_malformed_transition_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = bootstrap(options(
            temp_database_url(&dir),
            Some(vec!["ACTIVE=>APPROVED".to_string()]),
        ))
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("workflow.allowed_transitions"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_the_workflow() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = bootstrap(options(
            temp_database_url(&dir),
            Some(vec!["ACTIVE->APPROVED".to_string()]),
        ))
        .await
        .expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('users', 'jewelry', 'request_approval', 'auction', 'auction_history')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables");
        assert_eq!(table_count, 5);
        assert_eq!(app.approvals.policy().cancel, CancelBehavior::MarkCancelled);

        ReferenceDataset::load(&app.db_pool).await.expect("reference data");
        let created = app
            .approvals
            .create_from_user(UserApprovalRequest {
                sender_id: UserId(MEMBER_ALICE),
                jewelry_id: JewelryId(EMERALD_RING),
                request_time: Utc::now(),
            })
            .await
            .expect("create");
        let approved = app
            .approvals
            .set_state(created.id, UserId(STAFF_SAM), "APPROVED")
            .await
            .expect("listed edge");
        assert_eq!(approved.state, ApprovalState::Approved);

        let error = app
            .approvals
            .set_state(created.id, UserId(STAFF_SAM), "ACTIVE")
            .await
            .expect_err("unlisted edge");
        assert_eq!(error.class(), "illegal_transition");

        app.db_pool.close().await;
    }
}
