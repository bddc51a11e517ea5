//! Foundation types shared by every domain module.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use ids::TenantId;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
