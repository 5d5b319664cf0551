//! Pure approval workflow rules. Nothing in here touches storage: callers load
//! the records, run a rule, and persist whatever it produced.

pub mod policy;
pub mod rules;

pub use policy::{CancelBehavior, TransitionPolicy, WorkflowPolicy};
pub use rules::{
    cancel, change_state, confirm, originate_from_manager, originate_from_staff,
    originate_from_user, responder_stamp, ResponderStamp,
};
