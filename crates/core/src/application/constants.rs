// Engine constants (no magic values)

/// Default number of history entries in the history view
pub const DEFAULT_HISTORY_VIEW_LIMIT: usize = 50;

/// Default recompute attempts after an optimistic-version conflict
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Default interval for polling a shared store for writes made by other processes
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
