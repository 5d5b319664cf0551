use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use gavel_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use gavel_core::domain::approval::{ApprovalState, RequestApproval, RequestApprovalId};
use gavel_core::domain::jewelry::JewelryId;
use gavel_core::domain::page::{Page, PageRequest};
use gavel_core::domain::user::{Role, User, UserId};
use gavel_core::errors::{ApplicationError, DomainError, EntityKind};
use gavel_core::workflow::{self, WorkflowPolicy};

use super::{correlation_id, DEFAULT_MAX_PAGE_SIZE};
use crate::repositories::{
    InMemoryStore, RequestApprovalRepository, SqlRequestApprovalRepository, SqlUnitOfWorkFactory,
    UnitOfWork, UnitOfWorkFactory,
};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserApprovalRequest {
    pub sender_id: UserId,
    pub jewelry_id: JewelryId,
    pub request_time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffApprovalRequest {
    pub sender_id: UserId,
    pub prior_request_id: RequestApprovalId,
    pub request_time: DateTime<Utc>,
    pub valuation: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerApprovalRequest {
    pub sender_id: UserId,
    pub prior_request_id: RequestApprovalId,
    pub request_time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelApprovalRequest {
    pub request_id: RequestApprovalId,
    pub note: String,
}

/// Runs the sender -> staff -> manager approval workflow.
pub struct RequestApprovalService {
    units: Arc<dyn UnitOfWorkFactory>,
    requests: Arc<dyn RequestApprovalRepository>,
    policy: WorkflowPolicy,
    audit: Arc<dyn AuditSink>,
    max_page_size: u32,
}

impl RequestApprovalService {
    pub fn new(
        units: Arc<dyn UnitOfWorkFactory>,
        requests: Arc<dyn RequestApprovalRepository>,
        policy: WorkflowPolicy,
    ) -> Self {
        Self {
            units,
            requests,
            policy,
            audit: Arc::new(NoopAuditSink),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn sqlite(pool: DbPool, policy: WorkflowPolicy) -> Self {
        Self::new(
            Arc::new(SqlUnitOfWorkFactory::new(pool.clone())),
            Arc::new(SqlRequestApprovalRepository::new(pool)),
            policy,
        )
    }

    pub fn in_memory(store: InMemoryStore, policy: WorkflowPolicy) -> Self {
        Self::new(Arc::new(store.clone()), Arc::new(store), policy)
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub async fn get_request_by_id(
        &self,
        id: RequestApprovalId,
    ) -> Result<RequestApproval, ApplicationError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::RequestApproval, id.0))
    }

    /// Moves a request to `new_state` on behalf of `responder_id`.
    pub async fn set_state(
        &self,
        id: RequestApprovalId,
        responder_id: UserId,
        new_state: &str,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let mut request = load_request(&mut unit, id).await?;
        let responder = load_user(&mut unit, responder_id).await?;

        let target: ApprovalState = new_state.parse()?;
        let from = request.state;
        let stamp = workflow::responder_stamp(responder.actor(), Utc::now());
        if let Err(error) =
            workflow::change_state(&mut request, target, stamp, &self.policy.transitions)
        {
            warn!(
                event_name = "approval.state.rejected",
                correlation_id = %correlation_id,
                request_id = %id,
                from = %from,
                to = %target,
                "approval transition rejected by policy"
            );
            self.audit.emit(
                AuditEvent::new(
                    Some(id.0),
                    &correlation_id,
                    "approval.state_rejected",
                    AuditCategory::Approval,
                    Some(responder_id),
                    AuditOutcome::Rejected,
                )
                .with_metadata("from", from.as_str())
                .with_metadata("to", target.as_str()),
            );
            return Err(error.into());
        }

        unit.update_request(&request).await?;
        unit.commit().await?;

        info!(
            event_name = "approval.state.changed",
            correlation_id = %correlation_id,
            request_id = %id,
            responder_id = %responder_id,
            from = %from,
            to = %target,
            "approval state changed"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(id.0),
                &correlation_id,
                "approval.state_changed",
                AuditCategory::Approval,
                Some(responder_id),
                AuditOutcome::Success,
            )
            .with_metadata("from", from.as_str())
            .with_metadata("to", target.as_str()),
        );

        Ok(request)
    }

    /// Signs off a request without changing its state.
    pub async fn confirm(
        &self,
        id: RequestApprovalId,
        responder_id: UserId,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let mut request = load_request(&mut unit, id).await?;
        let responder = load_user(&mut unit, responder_id).await?;

        workflow::confirm(&mut request, workflow::responder_stamp(responder.actor(), Utc::now()));
        unit.update_request(&request).await?;
        unit.commit().await?;

        info!(
            event_name = "approval.confirmed",
            correlation_id = %correlation_id,
            request_id = %id,
            responder_id = %responder_id,
            "approval request confirmed"
        );
        self.record(&correlation_id, "approval.confirmed", &request, Some(responder_id));

        Ok(request)
    }

    /// Hides the request's jewelry and records the reason on the request.
    pub async fn cancel(
        &self,
        input: CancelApprovalRequest,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let mut request = load_request(&mut unit, input.request_id).await?;
        let mut jewelry = unit
            .find_jewelry(request.jewelry_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Jewelry, request.jewelry_id.0))?;

        workflow::cancel(&mut request, &mut jewelry, input.note, self.policy.cancel)?;
        unit.save_jewelry(&jewelry).await?;
        unit.update_request(&request).await?;
        unit.commit().await?;

        info!(
            event_name = "approval.cancelled",
            correlation_id = %correlation_id,
            request_id = %request.id,
            jewelry_id = %jewelry.id,
            state = %request.state,
            "approval request cancelled and jewelry hidden"
        );
        self.record(&correlation_id, "approval.cancelled", &request, None);

        Ok(request)
    }

    /// Opens the first request of a chain for a member's jewelry.
    pub async fn create_from_user(
        &self,
        input: UserApprovalRequest,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let sender = load_user(&mut unit, input.sender_id).await?;
        let jewelry = unit
            .find_jewelry(input.jewelry_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Jewelry, input.jewelry_id.0))?;

        let draft = workflow::originate_from_user(sender.id, &jewelry, input.request_time);
        let created = unit.insert_request(draft).await?;
        unit.commit().await?;

        self.log_created(&correlation_id, "approval.created.user", &created);
        Ok(created)
    }

    /// Staff escalation: re-raises `prior_request_id` with a valuation.
    pub async fn create_from_staff(
        &self,
        input: StaffApprovalRequest,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let sender = load_user(&mut unit, input.sender_id).await?;
        let prior = load_request(&mut unit, input.prior_request_id).await?;
        let prior_jewelry = unit
            .find_jewelry(prior.jewelry_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Jewelry, prior.jewelry_id.0))?;

        let draft = workflow::originate_from_staff(
            sender.id,
            &prior,
            &prior_jewelry,
            input.request_time,
            input.valuation,
        );
        let created = unit.insert_request(draft).await?;
        unit.commit().await?;

        self.log_created(&correlation_id, "approval.created.staff", &created);
        Ok(created)
    }

    /// Manager escalation: carries price and valuation forward from the prior request.
    pub async fn create_from_manager(
        &self,
        input: ManagerApprovalRequest,
    ) -> Result<RequestApproval, ApplicationError> {
        let correlation_id = correlation_id();
        let mut unit = self.units.begin().await?;
        let sender = load_user(&mut unit, input.sender_id).await?;
        let prior = load_request(&mut unit, input.prior_request_id).await?;

        let draft = workflow::originate_from_manager(sender.id, &prior, input.request_time);
        let created = unit.insert_request(draft).await?;
        unit.commit().await?;

        self.log_created(&correlation_id, "approval.created.manager", &created);
        Ok(created)
    }

    pub async fn list_by_sender_role(
        &self,
        role: Role,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, ApplicationError> {
        Ok(self.requests.list_by_sender_role(role, page.clamped(self.max_page_size)).await?)
    }

    pub async fn list_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, ApplicationError> {
        Ok(self.requests.list_by_user(user_id, page.clamped(self.max_page_size)).await?)
    }

    /// Requests that are both APPROVED and confirmed.
    pub async fn list_passed(
        &self,
        page: PageRequest,
    ) -> Result<Page<RequestApproval>, ApplicationError> {
        Ok(self.requests.list_passed(page.clamped(self.max_page_size)).await?)
    }

    /// The escalation chain ending at `id`, newest first, root last.
    pub async fn lineage(
        &self,
        id: RequestApprovalId,
    ) -> Result<Vec<RequestApproval>, ApplicationError> {
        let mut chain = vec![self.get_request_by_id(id).await?];
        let mut seen = BTreeSet::from([id]);

        while let Some(parent_id) = chain.last().and_then(|request| request.parent_id) {
            if !seen.insert(parent_id) {
                return Err(DomainError::InvariantViolation(format!(
                    "request approval {parent_id} appears twice in the lineage of {id}"
                ))
                .into());
            }
            let parent = self.requests.find_by_id(parent_id).await?.ok_or_else(|| {
                ApplicationError::not_found(EntityKind::RequestApproval, parent_id.0)
            })?;
            chain.push(parent);
        }

        Ok(chain)
    }

    fn log_created(&self, correlation_id: &str, event: &str, created: &RequestApproval) {
        info!(
            event_name = event,
            correlation_id = %correlation_id,
            request_id = %created.id,
            sender_id = %created.sender_id,
            jewelry_id = %created.jewelry_id,
            parent_id = ?created.parent_id.map(|id| id.0),
            "approval request created"
        );
        self.record(correlation_id, event, created, Some(created.sender_id));
    }

    fn record(
        &self,
        correlation_id: &str,
        event: &str,
        request: &RequestApproval,
        actor: Option<UserId>,
    ) {
        self.audit.emit(
            AuditEvent::new(
                Some(request.id.0),
                correlation_id,
                event,
                AuditCategory::Approval,
                actor,
                AuditOutcome::Success,
            )
            .with_metadata("state", request.state.as_str())
            .with_metadata("confirm", request.confirm.to_string())
            .with_metadata("jewelry_id", request.jewelry_id.to_string()),
        );
    }
}

async fn load_request(
    unit: &mut Box<dyn UnitOfWork>,
    id: RequestApprovalId,
) -> Result<RequestApproval, ApplicationError> {
    unit.find_request(id)
        .await?
        .ok_or_else(|| ApplicationError::not_found(EntityKind::RequestApproval, id.0))
}

async fn load_user(unit: &mut Box<dyn UnitOfWork>, id: UserId) -> Result<User, ApplicationError> {
    unit.find_user(id).await?.ok_or_else(|| ApplicationError::not_found(EntityKind::User, id.0))
}
