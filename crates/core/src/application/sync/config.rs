// Store Synchronization Configuration

use serde::{Deserialize, Serialize};

use crate::application::constants::{DEFAULT_HISTORY_VIEW_LIMIT, DEFAULT_MAX_CONFLICT_RETRIES};

/// How commands are persisted and views are bounded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Entries returned by the history view
    pub history_view_limit: usize,

    /// Attach the read version to every write and reject stale ones.
    /// Off: last writer wins per written field.
    pub optimistic_versioning: bool,

    /// Recompute attempts after a rejected stale write
    pub max_conflict_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            history_view_limit: DEFAULT_HISTORY_VIEW_LIMIT,
            optimistic_versioning: false,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}
