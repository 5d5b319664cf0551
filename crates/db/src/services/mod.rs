//! Workflow services. Each mutating operation opens one unit of work, resolves
//! every referenced record before touching anything, and commits once.

use tracing::info;
use uuid::Uuid;

use gavel_core::audit::{AuditEvent, AuditSink};

pub mod bidding;
pub mod request_approval;

pub use bidding::{BiddingService, PlaceBidRequest};
pub use request_approval::{
    CancelApprovalRequest, ManagerApprovalRequest, RequestApprovalService, StaffApprovalRequest,
    UserApprovalRequest,
};

/// Default upper bound on page sizes when the caller does not configure one.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Forwards audit events to the tracing pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            audit_event_id = %event.event_id,
            subject_id = ?event.subject_id,
            actor = ?event.actor.map(|id| id.0),
            category = ?event.category,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

pub(crate) fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}
