use chrono::{DateTime, Utc};
use clap::Subcommand;
use gavel_core::config::AppConfig;
use gavel_core::domain::approval::{RequestApproval, RequestApprovalId};
use gavel_core::domain::jewelry::JewelryId;
use gavel_core::domain::user::{Role, UserId};
use gavel_core::errors::ApplicationError;
use gavel_db::services::{
    CancelApprovalRequest, ManagerApprovalRequest, StaffApprovalRequest, UserApprovalRequest,
};
use gavel_db::RequestApprovalService;
use rust_decimal::Decimal;

use crate::commands::{open_database, preflight, CommandResult, PageArgs, Preflight};

#[derive(Debug, Clone, Subcommand)]
pub enum RequestCommand {
    #[command(about = "Show one approval request")]
    Get {
        #[arg(long)]
        id: i64,
    },
    #[command(about = "Move a request to a new state on behalf of a responder")]
    SetState {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        responder: i64,
        #[arg(long, help = "Target state, e.g. APPROVED or REJECTED")]
        state: String,
    },
    #[command(about = "Sign off a request without changing its state")]
    Confirm {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        responder: i64,
    },
    #[command(about = "Cancel a request and hide its jewelry")]
    Cancel {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = "")]
        note: String,
    },
    #[command(about = "Open a request for a member's jewelry")]
    CreateUser {
        #[arg(long)]
        sender: i64,
        #[arg(long)]
        jewelry: i64,
        #[arg(long, help = "RFC 3339 request time, defaults to now")]
        request_time: Option<DateTime<Utc>>,
    },
    #[command(about = "Escalate a prior request as staff, optionally with a valuation")]
    CreateStaff {
        #[arg(long)]
        sender: i64,
        #[arg(long)]
        prior: i64,
        #[arg(long)]
        valuation: Option<Decimal>,
        #[arg(long, help = "RFC 3339 request time, defaults to now")]
        request_time: Option<DateTime<Utc>>,
    },
    #[command(about = "Escalate a prior request as a manager")]
    CreateManager {
        #[arg(long)]
        sender: i64,
        #[arg(long)]
        prior: i64,
        #[arg(long, help = "RFC 3339 request time, defaults to now")]
        request_time: Option<DateTime<Utc>>,
    },
    #[command(about = "List requests whose sender has the given role")]
    ListRole {
        #[arg(long, help = "MEMBER, STAFF, MANAGER or ADMIN")]
        role: String,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "List requests sent by a user")]
    ListUser {
        #[arg(long)]
        user: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "List requests that are approved and confirmed")]
    ListPassed {
        #[command(flatten)]
        page: PageArgs,
    },
    #[command(about = "Show the escalation chain ending at a request, newest first")]
    Lineage {
        #[arg(long)]
        id: i64,
    },
}

impl RequestCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "request.get",
            Self::SetState { .. } => "request.set-state",
            Self::Confirm { .. } => "request.confirm",
            Self::Cancel { .. } => "request.cancel",
            Self::CreateUser { .. } => "request.create-user",
            Self::CreateStaff { .. } => "request.create-staff",
            Self::CreateManager { .. } => "request.create-manager",
            Self::ListRole { .. } => "request.list-role",
            Self::ListUser { .. } => "request.list-user",
            Self::ListPassed { .. } => "request.list-passed",
            Self::Lineage { .. } => "request.lineage",
        }
    }
}

pub fn run(command: RequestCommand) -> CommandResult {
    let name = command.name();
    let Preflight { config, runtime } = match preflight(name) {
        Ok(preflight) => preflight,
        Err(failure) => return failure,
    };
    let policy = match config.workflow_policy() {
        Ok(policy) => policy,
        Err(error) => {
            return CommandResult::failure(name, "config_validation", error.to_string(), 2);
        }
    };

    runtime.block_on(async {
        let pool = match open_database(name, &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let service = RequestApprovalService::sqlite(pool.clone(), policy)
            .with_max_page_size(config.pagination.max_page_size);

        let result = execute(&service, &config, command).await;
        pool.close().await;

        result.unwrap_or_else(|error| CommandResult::from_application_error(name, &error))
    })
}

async fn execute(
    service: &RequestApprovalService,
    config: &AppConfig,
    command: RequestCommand,
) -> Result<CommandResult, ApplicationError> {
    let name = command.name();
    let result = match command {
        RequestCommand::Get { id } => {
            let request = service.get_request_by_id(RequestApprovalId(id)).await?;
            CommandResult::success_with_data(name, format!("request approval {id}"), &request)
        }
        RequestCommand::SetState { id, responder, state } => {
            let request =
                service.set_state(RequestApprovalId(id), UserId(responder), &state).await?;
            CommandResult::success_with_data(
                name,
                format!("request approval {id} is now {}", request.state),
                &request,
            )
        }
        RequestCommand::Confirm { id, responder } => {
            let request = service.confirm(RequestApprovalId(id), UserId(responder)).await?;
            CommandResult::success_with_data(
                name,
                format!("request approval {id} confirmed by user {responder}"),
                &request,
            )
        }
        RequestCommand::Cancel { id, note } => {
            let request = service
                .cancel(CancelApprovalRequest { request_id: RequestApprovalId(id), note })
                .await?;
            CommandResult::success_with_data(
                name,
                format!("request approval {id} cancelled; jewelry {} hidden", request.jewelry_id),
                &request,
            )
        }
        RequestCommand::CreateUser { sender, jewelry, request_time } => {
            let request = service
                .create_from_user(UserApprovalRequest {
                    sender_id: UserId(sender),
                    jewelry_id: JewelryId(jewelry),
                    request_time: request_time.unwrap_or_else(Utc::now),
                })
                .await?;
            created(name, &request)
        }
        RequestCommand::CreateStaff { sender, prior, valuation, request_time } => {
            let request = service
                .create_from_staff(StaffApprovalRequest {
                    sender_id: UserId(sender),
                    prior_request_id: RequestApprovalId(prior),
                    request_time: request_time.unwrap_or_else(Utc::now),
                    valuation,
                })
                .await?;
            created(name, &request)
        }
        RequestCommand::CreateManager { sender, prior, request_time } => {
            let request = service
                .create_from_manager(ManagerApprovalRequest {
                    sender_id: UserId(sender),
                    prior_request_id: RequestApprovalId(prior),
                    request_time: request_time.unwrap_or_else(Utc::now),
                })
                .await?;
            created(name, &request)
        }
        RequestCommand::ListRole { role, page } => {
            let role: Role = role.parse()?;
            let listed = service.list_by_sender_role(role, page.to_request(config)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} request(s) sent by {role} users", listed.total_items),
                &listed,
            )
        }
        RequestCommand::ListUser { user, page } => {
            let listed = service.list_by_user(UserId(user), page.to_request(config)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} request(s) sent by user {user}", listed.total_items),
                &listed,
            )
        }
        RequestCommand::ListPassed { page } => {
            let listed = service.list_passed(page.to_request(config)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} passed request(s)", listed.total_items),
                &listed,
            )
        }
        RequestCommand::Lineage { id } => {
            let chain = service.lineage(RequestApprovalId(id)).await?;
            CommandResult::success_with_data(
                name,
                format!("{} request(s) in the chain ending at {id}", chain.len()),
                &chain,
            )
        }
    };

    Ok(result)
}

fn created(name: &str, request: &RequestApproval) -> CommandResult {
    CommandResult::success_with_data(
        name,
        format!("request approval {} created in state {}", request.id, request.state),
        request,
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gavel_core::config::AppConfig;
    use gavel_core::domain::jewelry::JewelryId;
    use gavel_core::domain::user::UserId;
    use gavel_core::workflow::WorkflowPolicy;
    use gavel_db::fixtures::{ReferenceDataset, DIAMOND_BROOCH, MEMBER_BOB, STAFF_SAM};
    use gavel_db::services::UserApprovalRequest;
    use gavel_db::{InMemoryStore, RequestApprovalService};
    use serde_json::Value;

    use super::{execute, RequestCommand};
    use crate::commands::PageArgs;

    async fn service() -> RequestApprovalService {
        let store = InMemoryStore::new();
        ReferenceDataset::load_into(&store).await.expect("reference data");
        RequestApprovalService::in_memory(store, WorkflowPolicy::default())
    }

    fn payload(output: &str) -> Value {
        serde_json::from_str(output).expect("json")
    }

    #[tokio::test]
    async fn set_state_reports_the_updated_record() {
        let service = service().await;
        let created = service
            .create_from_user(UserApprovalRequest {
                sender_id: UserId(MEMBER_BOB),
                jewelry_id: JewelryId(DIAMOND_BROOCH),
                request_time: Utc::now(),
            })
            .await
            .expect("create");

        let result = execute(
            &service,
            &AppConfig::default(),
            RequestCommand::SetState {
                id: created.id.0,
                responder: STAFF_SAM,
                state: "approved".to_string(),
            },
        )
        .await
        .expect("set state");

        let body = payload(&result.output);
        assert_eq!(body["command"], "request.set-state");
        assert_eq!(body["data"]["state"], "APPROVED");
        assert_eq!(body["data"]["responder_id"], STAFF_SAM);
    }

    #[tokio::test]
    async fn unknown_role_is_an_invalid_argument() {
        let service = service().await;
        let page = PageArgs { page: 0, size: None, oldest_first: false };

        let error = execute(
            &service,
            &AppConfig::default(),
            RequestCommand::ListRole { role: "auctioneer".to_string(), page },
        )
        .await
        .expect_err("unknown role");

        assert_eq!(error.class(), "invalid_argument");
    }
}
