// Domain Layer - Pure data model of the rotation

pub mod error;
pub mod history;
pub mod rep;
pub mod snapshot;
pub mod status;

// Re-exports
pub use error::DomainError;
pub use history::{Action, EventId, HistoryEvent};
pub use rep::{Rep, RepId, UNKNOWN_REP_NAME};
pub use snapshot::{InvariantViolation, Snapshot, SnapshotPatch};
pub use status::{ActivityStatus, RepStatus};
