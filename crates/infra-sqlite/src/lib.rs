// upnext Infrastructure - SQLite Adapter
// Implements: SnapshotStore (field-level writes, version counter, change polling)

mod connection;
mod migration;
mod snapshot_store;

pub use connection::create_pool;
pub use migration::run_migrations;
pub use snapshot_store::SqliteSnapshotStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
