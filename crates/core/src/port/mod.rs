// Port Layer - Interfaces for external collaborators

pub mod snapshot_store;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use snapshot_store::{InMemorySnapshotStore, SnapshotStore, SnapshotWatch};
pub use time_provider::{FixedTimeProvider, SystemTimeProvider, TimeProvider};
