use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalState, NewRequestApproval, RequestApproval};
use crate::domain::stored_precision;
use crate::domain::jewelry::Jewelry;
use crate::domain::user::{Actor, Role, UserId};
use crate::errors::DomainError;
use crate::workflow::policy::{CancelBehavior, TransitionPolicy};

/// Audit fields written whenever someone responds to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderStamp {
    pub responder_id: UserId,
    /// Present only when the responder holds the STAFF role.
    pub staff_id: Option<UserId>,
    pub responded_at: DateTime<Utc>,
}

pub fn responder_stamp(actor: Actor, at: DateTime<Utc>) -> ResponderStamp {
    let staff_id = match actor.role {
        Role::Staff => Some(actor.id),
        Role::Member | Role::Manager | Role::Admin => None,
    };
    ResponderStamp { responder_id: actor.id, staff_id, responded_at: stored_precision(at) }
}

fn apply_stamp(request: &mut RequestApproval, stamp: ResponderStamp) {
    if let Some(staff_id) = stamp.staff_id {
        request.staff_id = Some(staff_id);
    }
    request.responder_id = Some(stamp.responder_id);
    request.response_time = Some(stamp.responded_at);
}

/// Moves `request` to `target`. Confirmation is always cleared.
pub fn change_state(
    request: &mut RequestApproval,
    target: ApprovalState,
    stamp: ResponderStamp,
    policy: &TransitionPolicy,
) -> Result<(), DomainError> {
    policy.check(request.state, target)?;
    apply_stamp(request, stamp);
    request.state = target;
    request.confirm = false;
    Ok(())
}

/// Signs off the request without touching its state.
pub fn confirm(request: &mut RequestApproval, stamp: ResponderStamp) {
    apply_stamp(request, stamp);
    request.confirm = true;
}

/// Hides the jewelry under evaluation and annotates the request.
pub fn cancel(
    request: &mut RequestApproval,
    jewelry: &mut Jewelry,
    note: impl Into<String>,
    behavior: CancelBehavior,
) -> Result<(), DomainError> {
    if request.jewelry_id != jewelry.id {
        return Err(DomainError::InvariantViolation(format!(
            "request {} references jewelry {}, not {}",
            request.id, request.jewelry_id, jewelry.id
        )));
    }

    jewelry.hide();
    request.note = Some(note.into());
    if behavior == CancelBehavior::MarkCancelled {
        request.state = ApprovalState::Cancelled;
        request.confirm = false;
    }
    Ok(())
}

/// First request of a chain, raised by the jewelry's owner.
pub fn originate_from_user(
    sender: UserId,
    jewelry: &Jewelry,
    request_time: DateTime<Utc>,
) -> NewRequestApproval {
    NewRequestApproval {
        parent_id: None,
        state: ApprovalState::Active,
        confirm: false,
        sender_id: sender,
        staff_id: None,
        jewelry_id: jewelry.id,
        desired_price: jewelry.price,
        valuation: None,
        request_time: stored_precision(request_time),
    }
}

/// Staff re-raises a member's request with a valuation attached. The desired
/// price is re-read from the jewelry, not copied from the prior request.
pub fn originate_from_staff(
    sender: UserId,
    prior: &RequestApproval,
    prior_jewelry: &Jewelry,
    request_time: DateTime<Utc>,
    valuation: Option<Decimal>,
) -> NewRequestApproval {
    NewRequestApproval {
        parent_id: Some(prior.id),
        state: ApprovalState::Active,
        confirm: false,
        sender_id: sender,
        staff_id: Some(sender),
        jewelry_id: prior.jewelry_id,
        desired_price: prior_jewelry.price,
        valuation,
        request_time: stored_precision(request_time),
    }
}

/// Manager re-raises a staff request; the escalating staff member stays
/// attached as `staff`.
pub fn originate_from_manager(
    sender: UserId,
    prior: &RequestApproval,
    request_time: DateTime<Utc>,
) -> NewRequestApproval {
    NewRequestApproval {
        parent_id: Some(prior.id),
        state: ApprovalState::Active,
        confirm: false,
        sender_id: sender,
        staff_id: Some(prior.sender_id),
        jewelry_id: prior.jewelry_id,
        desired_price: prior.desired_price,
        valuation: prior.valuation,
        request_time: stored_precision(request_time),
    }
}
