pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::approval::{ApprovalState, NewRequestApproval, RequestApproval, RequestApprovalId};
pub use domain::auction::{Auction, AuctionId, AuctionState, Bid, BidId, NewBid};
pub use domain::jewelry::{Jewelry, JewelryId, JewelryState};
pub use domain::page::{Page, PageRequest, SortOrder};
pub use domain::user::{AccountState, Actor, Role, User, UserId};
pub use errors::{ApplicationError, DomainError, EntityKind};
pub use workflow::{CancelBehavior, TransitionPolicy, WorkflowPolicy};
