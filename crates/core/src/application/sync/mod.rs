// Store Synchronization Adapter - read, decide, write the changed fields

mod config;
mod observer;

pub use config::SyncConfig;
pub use observer::ObserverHandle;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::availability::{self, Command, Decision, NoOpReason};
use crate::application::views::{self, ActiveQueueView, RosterEntry, StatsRow};
use crate::domain::{HistoryEvent, RepId, Snapshot};
use crate::error::{AppError, Result};
use crate::port::{SnapshotStore, TimeProvider};

/// What a command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied {
        event: Option<HistoryEvent>,
        version: u64,
    },
    /// Store destroyed, back to pre-setup state
    Reset,
    NoOp(NoOpReason),
}

impl CommandOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, CommandOutcome::NoOp(_))
    }

    pub fn event(&self) -> Option<&HistoryEvent> {
        match self {
            CommandOutcome::Applied { event, .. } => event.as_ref(),
            _ => None,
        }
    }
}

/// Runs commands against the shared store.
///
/// Each command is one read-modify-write cycle with no locking. Two callers
/// that read the same version both compute from it; unless optimistic
/// versioning is on, the later write wins for every field both touched.
/// Lost updates of that kind are an accepted limitation of the store, not
/// something this service can detect.
pub struct RotationService {
    store: Arc<dyn SnapshotStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: SyncConfig,
}

impl RotationService {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Latest stored snapshot; an empty store reads as pre-setup
    pub async fn current_snapshot(&self) -> Result<Snapshot> {
        let (stored, version) = self.store.read_versioned().await?;
        // A reset store still carries its counter
        let snapshot = Snapshot {
            version,
            ..stored.unwrap_or_default()
        };

        let violations = snapshot.invariant_violations();
        if !violations.is_empty() {
            let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
            warn!(
                version = snapshot.version,
                violations = ?details,
                "Stored snapshot breaks membership invariants (concurrent overwrite?)"
            );
        }
        Ok(snapshot)
    }

    /// Execute one command
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome> {
        let mut conflicts = 0;

        loop {
            let snapshot = self.current_snapshot().await?;
            let now = self.time_provider.now();

            match availability::decide(&snapshot, &command, now) {
                Decision::NoOp(reason) => {
                    debug!(
                        command = command.name(),
                        rep_id = ?command.rep_id(),
                        reason = %reason,
                        "Command was a no-op"
                    );
                    return Ok(CommandOutcome::NoOp(reason));
                }
                Decision::Reset => {
                    self.store.destroy().await?;
                    info!(command = command.name(), "Store destroyed");
                    return Ok(CommandOutcome::Reset);
                }
                Decision::Apply(change) => {
                    let expected = self
                        .config
                        .optimistic_versioning
                        .then_some(snapshot.version);

                    match self.store.write_fields(&change.patch, expected).await {
                        Ok(version) => {
                            info!(
                                command = command.name(),
                                rep_id = ?command.rep_id(),
                                action = ?change.event.as_ref().map(|e| e.action.to_string()),
                                fields = ?change.patch.changed_fields(),
                                version,
                                "Command applied"
                            );
                            return Ok(CommandOutcome::Applied {
                                event: change.event,
                                version,
                            });
                        }
                        Err(AppError::StaleSnapshot { expected, actual })
                            if conflicts < self.config.max_conflict_retries =>
                        {
                            conflicts += 1;
                            warn!(
                                command = command.name(),
                                expected,
                                actual,
                                attempt = conflicts,
                                "Stale snapshot, recomputing from a fresh read"
                            );
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }
    }

    pub async fn complete_setup(&self, names: Vec<String>) -> Result<CommandOutcome> {
        self.execute(Command::CompleteSetup { names }).await
    }

    pub async fn add_rep(&self, name: impl Into<String>) -> Result<CommandOutcome> {
        self.execute(Command::AddRep { name: name.into() }).await
    }

    pub async fn remove_rep(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::RemoveRep { rep_id }).await
    }

    pub async fn check_in(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::CheckIn { rep_id }).await
    }

    pub async fn check_out(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::CheckOut { rep_id }).await
    }

    pub async fn take_customer(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::TakeCustomer { rep_id }).await
    }

    pub async fn mark_with_customer(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::MarkWithCustomer { rep_id }).await
    }

    pub async fn finished_with_customer(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::FinishedWithCustomer { rep_id }).await
    }

    pub async fn toggle_step_away(&self, rep_id: RepId) -> Result<CommandOutcome> {
        self.execute(Command::ToggleStepAway { rep_id }).await
    }

    /// Destructive: the caller must have confirmed
    pub async fn clear_day(&self) -> Result<CommandOutcome> {
        self.execute(Command::ClearDay).await
    }

    /// Destructive: the caller must have confirmed
    pub async fn full_reset(&self) -> Result<CommandOutcome> {
        self.execute(Command::FullReset).await
    }

    pub async fn active_queue_view(&self) -> Result<ActiveQueueView> {
        Ok(views::active_queue_view(&self.current_snapshot().await?))
    }

    pub async fn roster_view(&self) -> Result<Vec<RosterEntry>> {
        Ok(views::roster_view(&self.current_snapshot().await?))
    }

    pub async fn stats_view(&self) -> Result<Vec<StatsRow>> {
        Ok(views::stats_view(&self.current_snapshot().await?))
    }

    /// Latest events, bounded by `history_view_limit`
    pub async fn history_view(&self) -> Result<Vec<HistoryEvent>> {
        let snapshot = self.current_snapshot().await?;
        Ok(views::history_view(
            &snapshot,
            self.config.history_view_limit,
        ))
    }

    /// Call `callback` with every snapshot the store broadcasts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: FnMut(Arc<Snapshot>) + Send + 'static,
    {
        observer::spawn(self.store.subscribe(), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;
    use crate::port::snapshot_store::MockSnapshotStore;
    use crate::port::{FixedTimeProvider, InMemorySnapshotStore};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    const T0: i64 = 1_700_000_000_000;

    fn service_with(store: Arc<dyn SnapshotStore>, config: SyncConfig) -> RotationService {
        RotationService::new(store, Arc::new(FixedTimeProvider::new(T0)), config)
    }

    async fn floor(names: &[&str]) -> (Arc<InMemorySnapshotStore>, RotationService) {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service_with(store.clone(), SyncConfig::default());
        let names = names.iter().map(|n| n.to_string()).collect();
        assert_ok!(service.complete_setup(names).await);
        (store, service)
    }

    #[tokio::test]
    async fn test_applied_command_persists_and_returns_event() {
        let (store, service) = floor(&["Alice", "Bob"]).await;

        let outcome = assert_ok!(service.check_in(1).await);
        let event = outcome.event().cloned().unwrap();
        assert_eq!(event.action, Action::CheckedIn);
        assert_eq!(event.id, T0);

        let stored = store.read().await.unwrap().unwrap();
        assert_eq!(stored.queue, vec![1]);
        assert_eq!(stored.history, vec![event]);
    }

    #[tokio::test]
    async fn test_noop_leaves_store_untouched() {
        let (store, service) = floor(&["Alice", "Bob"]).await;
        service.check_in(1).await.unwrap();
        service.check_in(2).await.unwrap();
        let before = store.read().await.unwrap();

        let outcome = service.take_customer(2).await.unwrap();

        assert_eq!(
            outcome,
            CommandOutcome::NoOp(NoOpReason::NotDesignated {
                rep_id: 2,
                designated: Some(1)
            })
        );
        assert_eq!(store.read().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_same_instant_events_keep_causal_order() {
        let (_store, service) = floor(&["Alice", "Bob"]).await;
        service.check_in(1).await.unwrap();
        service.check_in(2).await.unwrap();
        service.take_customer(1).await.unwrap();

        let history = service.history_view().await.unwrap();
        let ids: Vec<i64> = history.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![T0 + 2, T0 + 1, T0]);
    }

    #[tokio::test]
    async fn test_history_view_is_bounded() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service_with(
            store,
            SyncConfig {
                history_view_limit: 3,
                ..Default::default()
            },
        );
        service.complete_setup(vec!["Alice".to_string()]).await.unwrap();
        service.check_in(1).await.unwrap();
        for _ in 0..4 {
            service.toggle_step_away(1).await.unwrap();
        }

        let history = service.history_view().await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].action, Action::Returned);
    }

    #[tokio::test]
    async fn test_full_reset_destroys_store() {
        let (store, service) = floor(&["Alice"]).await;

        let outcome = service.full_reset().await.unwrap();

        assert_eq!(outcome, CommandOutcome::Reset);
        assert!(store.read().await.unwrap().is_none());
        let snapshot = service.current_snapshot().await.unwrap();
        assert!(!snapshot.is_setup_complete);
        assert!(snapshot.reps.is_empty());
    }

    #[tokio::test]
    async fn test_store_unavailable_surfaces_and_has_no_effect() {
        let (store, service) = floor(&["Alice"]).await;
        let before = store.read().await.unwrap();

        store.set_unavailable(true);
        let err = service.check_in(1).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));

        store.set_unavailable(false);
        assert_eq!(store.read().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_noop_never_writes() {
        let mut store = MockSnapshotStore::new();
        store.expect_read_versioned().returning(|| Ok((None, 0)));
        store.expect_write_fields().never();
        store.expect_write().never();
        store.expect_destroy().never();

        let service = service_with(Arc::new(store), SyncConfig::default());
        let outcome = service.check_in(1).await.unwrap();

        assert_eq!(outcome, CommandOutcome::NoOp(NoOpReason::UnknownRep { rep_id: 1 }));
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let mut store = MockSnapshotStore::new();
        store.expect_read_versioned().returning(|| Ok((None, 0)));
        store
            .expect_write_fields()
            .times(1)
            .returning(|_, _| Err(AppError::StoreUnavailable("connection reset".to_string())));

        let service = service_with(Arc::new(store), SyncConfig::default());
        let err = service.complete_setup(vec!["Alice".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::StoreUnavailable(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_last_writer_wins_without_versioning() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_read_versioned()
            .returning(|| Ok((Some(Snapshot::default()), 0)));
        store
            .expect_write_fields()
            .withf(|patch, expected| patch.is_setup_complete == Some(true) && expected.is_none())
            .times(1)
            .returning(|_, _| Ok(1));

        let service = service_with(Arc::new(store), SyncConfig::default());
        let outcome = service.complete_setup(vec!["Alice".to_string()]).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Applied { version: 1, .. }));
    }

    #[tokio::test]
    async fn test_optimistic_versioning_retries_then_gives_up() {
        let mut store = MockSnapshotStore::new();
        store.expect_read_versioned().returning(|| {
            Ok((
                Some(Snapshot {
                    version: 4,
                    ..Default::default()
                }),
                4,
            ))
        });
        store
            .expect_write_fields()
            .withf(|_, expected| *expected == Some(4))
            .times(3)
            .returning(|_, _| Err(AppError::StaleSnapshot { expected: 4, actual: 5 }));

        let service = service_with(
            Arc::new(store),
            SyncConfig {
                optimistic_versioning: true,
                max_conflict_retries: 2,
                ..Default::default()
            },
        );
        let err = service.complete_setup(vec!["Alice".to_string()]).await.unwrap_err();

        assert!(matches!(err, AppError::StaleSnapshot { expected: 4, actual: 5 }));
    }

    #[tokio::test]
    async fn test_optimistic_versioning_accepts_current_version() {
        let (store, _) = floor(&["Alice", "Bob"]).await;
        let service = RotationService::new(
            store.clone(),
            Arc::new(FixedTimeProvider::new(T0)),
            SyncConfig {
                optimistic_versioning: true,
                ..Default::default()
            },
        );
        let outcome = service.check_in(1).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Applied { version: 2, .. }));

        let stored = store.read().await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.queue, vec![1]);
    }

    #[tokio::test]
    async fn test_write_computed_before_reset_is_rejected() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = service_with(
            store.clone(),
            SyncConfig {
                optimistic_versioning: true,
                max_conflict_retries: 0,
                ..Default::default()
            },
        );
        service
            .complete_setup(vec!["Alice".to_string(), "Bob".to_string()])
            .await
            .unwrap();
        let before_reset = service.current_snapshot().await.unwrap();
        let now = FixedTimeProvider::new(T0).now();
        let Decision::Apply(stale) =
            availability::decide(&before_reset, &Command::CheckIn { rep_id: 2 }, now)
        else {
            panic!("check-in should apply");
        };

        service.full_reset().await.unwrap();
        assert_eq!(service.current_snapshot().await.unwrap().version, 2);
        service.complete_setup(vec!["Zed".to_string()]).await.unwrap();

        let err = store
            .write_fields(&stale.patch, Some(before_reset.version))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StaleSnapshot { expected: 1, actual: 3 }));

        let stored = store.read().await.unwrap().unwrap();
        assert!(stored.queue.is_empty());
        assert_eq!(stored.reps.len(), 1);
    }

    #[tokio::test]
    async fn test_observer_receives_current_and_later_snapshots() {
        let (_store, service) = floor(&["Alice"]).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = service.observe(move |snapshot| {
            let _ = tx.send(snapshot.queue.clone());
        });

        let first = rx.recv().await.unwrap();
        assert!(first.is_empty());

        service.check_in(1).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next, vec![1]);

        assert!(handle.is_active());
        handle.unsubscribe();
    }
}
