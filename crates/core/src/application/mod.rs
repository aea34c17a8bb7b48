// Application Layer - Use Cases and Derived Views

pub mod availability;
pub mod constants;
pub mod ledger;
pub mod rotation;
pub mod shutdown;
pub mod stats;
pub mod sync;
pub mod views;

// Re-exports
pub use availability::{decide, Change, Command, Decision, NoOpReason};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use sync::{CommandOutcome, ObserverHandle, RotationService, SyncConfig};
pub use views::{ActiveQueueView, QueueEntry, RosterEntry, StatsRow};
