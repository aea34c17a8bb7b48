// Snapshot observers - rehydrate local state from store broadcasts

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::Snapshot;
use crate::port::SnapshotWatch;

/// Live subscription; delivery stops on `unsubscribe` or drop
pub struct ObserverHandle {
    task: JoinHandle<()>,
}

impl ObserverHandle {
    /// Stop delivering snapshots
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task delivering the current snapshot, then every later one.
///
/// An empty store is delivered as the default (pre-setup) snapshot.
/// Intermediate snapshots may be skipped when writes arrive faster than the
/// callback runs; the latest one is always delivered.
pub(crate) fn spawn<F>(mut rx: SnapshotWatch, mut callback: F) -> ObserverHandle
where
    F: FnMut(Arc<Snapshot>) + Send + 'static,
{
    let task = tokio::spawn(async move {
        loop {
            let latest = rx.borrow_and_update().clone();
            let snapshot = latest.unwrap_or_default();
            debug!(version = snapshot.version, "Delivering snapshot to observer");
            callback(snapshot);

            if rx.changed().await.is_err() {
                debug!("Snapshot store dropped, observer finished");
                break;
            }
        }
    });

    ObserverHandle { task }
}
