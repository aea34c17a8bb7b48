// Snapshot Store Port (external replicated key-value document store)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{Snapshot, SnapshotPatch};
use crate::error::{AppError, Result};

/// Latest snapshot seen by a subscriber (`None` = empty store)
pub type SnapshotWatch = watch::Receiver<Option<Arc<Snapshot>>>;

/// Store interface for the persisted snapshot.
///
/// No compare-and-swap is assumed. Every command reads, computes and writes;
/// two commands computed from the same read race, and the later write wins
/// for every field both of them wrote.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the latest snapshot, `None` when nothing is stored
    async fn read(&self) -> Result<Option<Snapshot>>;

    /// Read the latest snapshot together with the store version.
    ///
    /// The version keeps counting across `destroy`, so an empty store that was
    /// reset still reports where its counter stands. Versioned writers compare
    /// against this value.
    async fn read_versioned(&self) -> Result<(Option<Snapshot>, u64)> {
        let snapshot = self.read().await?;
        let version = snapshot.as_ref().map_or(0, |s| s.version);
        Ok((snapshot, version))
    }

    /// Overwrite the whole snapshot, returning the new version
    async fn write(&self, snapshot: &Snapshot) -> Result<u64>;

    /// Persist only the fields in `patch`, returning the new version.
    ///
    /// With `expected_version` set, the write is rejected with
    /// `AppError::StaleSnapshot` when the store has moved on. The default
    /// implementation is a read-merge-write of the full snapshot, so fields the
    /// patch does not name are still rewritten from the read (last writer
    /// wins). Adapters with per-field writes override it.
    async fn write_fields(
        &self,
        patch: &SnapshotPatch,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        let (current, version) = self.read_versioned().await?;
        if let Some(expected) = expected_version {
            if version != expected {
                return Err(AppError::StaleSnapshot {
                    expected,
                    actual: version,
                });
            }
        }
        let mut current = current.unwrap_or_default();
        current.version = version;
        current.merge(patch);
        self.write(&current).await
    }

    /// Subscribe to snapshot changes, including locally originated ones
    fn subscribe(&self) -> SnapshotWatch;

    /// Clear all persisted state.
    ///
    /// Counts as a write: the version moves forward so writes computed from a
    /// pre-reset read are rejected as stale.
    async fn destroy(&self) -> Result<()>;
}

/// In-process store adapter.
///
/// Used by tests and by the `memory` store backend. Field merges happen under
/// one lock, so only commands computed from a stale read can lose updates.
pub struct InMemorySnapshotStore {
    state: Mutex<Stored>,
    tx: watch::Sender<Option<Arc<Snapshot>>>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct Stored {
    snapshot: Option<Snapshot>,
    // Survives destroy
    version: u64,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            state: Mutex::new(Stored::default()),
            tx,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Start from an existing document
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Some(Arc::new(snapshot.clone())));
        Self {
            state: Mutex::new(Stored {
                version: snapshot.version,
                snapshot: Some(snapshot),
            }),
            tx,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a network partition: every call fails with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, Stored>> {
        self.state
            .lock()
            .map_err(|_| AppError::StoreUnavailable("in-memory store lock poisoned".to_string()))
    }

    fn publish(&self, snapshot: Option<Snapshot>) {
        self.tx.send_replace(snapshot.map(Arc::new));
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn read(&self) -> Result<Option<Snapshot>> {
        self.check_available()?;
        Ok(self.lock_state()?.snapshot.clone())
    }

    async fn read_versioned(&self) -> Result<(Option<Snapshot>, u64)> {
        self.check_available()?;
        let state = self.lock_state()?;
        Ok((state.snapshot.clone(), state.version))
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<u64> {
        self.check_available()?;
        let mut state = self.lock_state()?;

        state.version += 1;
        let mut next = snapshot.clone();
        next.version = state.version;

        state.snapshot = Some(next.clone());
        self.publish(Some(next));
        Ok(state.version)
    }

    async fn write_fields(
        &self,
        patch: &SnapshotPatch,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        self.check_available()?;
        let mut state = self.lock_state()?;

        if let Some(expected) = expected_version {
            if state.version != expected {
                return Err(AppError::StaleSnapshot {
                    expected,
                    actual: state.version,
                });
            }
        }
        let mut next = state.snapshot.clone().unwrap_or_default();
        next.merge(patch);
        state.version += 1;
        next.version = state.version;

        state.snapshot = Some(next.clone());
        self.publish(Some(next));
        Ok(state.version)
    }

    fn subscribe(&self) -> SnapshotWatch {
        self.tx.subscribe()
    }

    async fn destroy(&self) -> Result<()> {
        self.check_available()?;
        let mut state = self.lock_state()?;
        state.snapshot = None;
        state.version += 1;
        self.publish(None);
        Ok(())
    }
}
