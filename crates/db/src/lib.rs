pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod services;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{ReferenceDataset, SeedResult, VerificationResult};
pub use repositories::{InMemoryStore, RepositoryError, UnitOfWork, UnitOfWorkFactory};
pub use services::{BiddingService, RequestApprovalService, TracingAuditSink};
