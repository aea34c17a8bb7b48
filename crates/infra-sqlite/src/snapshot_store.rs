// SQLite SnapshotStore Implementation

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};
use upnext_core::application::ShutdownToken;
use upnext_core::domain::{Snapshot, SnapshotPatch};
use upnext_core::error::{AppError, Result};
use upnext_core::port::{SnapshotStore, SnapshotWatch, TimeProvider};

// Every storage failure is "the store is unreachable" to the engine; keep the
// SQLite code in the message for operators.
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "5" | "517" => AppError::StoreUnavailable(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::StoreUnavailable(format!(
                        "Database full: {}",
                        db_err.message()
                    )),
                    "8" => AppError::StoreUnavailable(format!(
                        "Database is read-only: {}",
                        db_err.message()
                    )),
                    _ => AppError::StoreUnavailable(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            }
            None => AppError::StoreUnavailable(format!("Database error: {}", db_err.message())),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            AppError::StoreUnavailable(format!("Connection pool unavailable: {}", err))
        }
        _ => AppError::StoreUnavailable(err.to_string()),
    }
}

fn to_version(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

/// Snapshot document stored as one JSON value per top-level field.
///
/// Writes touch only the fields named in the patch, so two writers changing
/// different fields both land; writers of the same field race and the later
/// commit wins. `store_meta.version` is bumped on every write and on
/// `destroy`, and drives both optimistic versioning and change polling.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    tx: watch::Sender<Option<Arc<Snapshot>>>,
    published_version: AtomicU64,
}

impl SqliteSnapshotStore {
    /// Open the store; subscribers start from the current stored snapshot
    pub async fn open(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Result<Self> {
        let (tx, _rx) = watch::channel(None);
        let store = Self {
            pool,
            time_provider,
            tx,
            published_version: AtomicU64::new(0),
        };

        let (current, version) = store.read_versioned().await?;
        debug!(version, "SQLite snapshot store opened");
        store.publish(current, version);
        Ok(store)
    }

    fn publish(&self, snapshot: Option<Snapshot>, version: u64) {
        self.published_version.store(version, Ordering::SeqCst);
        self.tx.send_replace(snapshot.map(Arc::new));
    }

    async fn stored_version(&self) -> Result<u64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM store_meta WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(version.map(to_version).unwrap_or(0))
    }

    /// Publish the stored snapshot if another writer changed it.
    ///
    /// Returns `true` when subscribers were notified.
    pub async fn refresh(&self) -> Result<bool> {
        let previous = self.published_version.load(Ordering::SeqCst);
        if self.stored_version().await? == previous {
            return Ok(false);
        }

        let (snapshot, version) = self.read_versioned().await?;
        debug!(previous, current = version, "External snapshot change detected");
        self.publish(snapshot, version);
        Ok(true)
    }

    /// Poll for writes made through other connections until `shutdown` fires
    pub fn spawn_change_poller(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: ShutdownToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_ms = interval.as_millis() as u64,
                "Snapshot change poller started"
            );
            loop {
                tokio::select! {
                    _ = sleep(interval) => {},
                    _ = shutdown.wait() => {
                        info!("Snapshot change poller stopped");
                        break;
                    }
                }

                if let Err(e) = self.refresh().await {
                    error!(error = %e, "Snapshot change poll failed");
                }
            }
        })
    }
}

// No field rows means an empty (never written or destroyed) store; the
// version row outlives destroy.
async fn load_snapshot(conn: &mut SqliteConnection) -> Result<(Option<Snapshot>, u64)> {
    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM store_meta WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    let version = version.map(to_version).unwrap_or(0);

    let rows: Vec<(String, String)> = sqlx::query_as("SELECT field, value FROM store_fields")
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    if rows.is_empty() {
        return Ok((None, version));
    }

    let mut document = Map::new();
    for (field, value) in rows {
        document.insert(field, serde_json::from_str::<Value>(&value)?);
    }

    let mut snapshot: Snapshot = serde_json::from_value(Value::Object(document))?;
    snapshot.version = version;
    Ok((Some(snapshot), version))
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn read(&self) -> Result<Option<Snapshot>> {
        Ok(self.read_versioned().await?.0)
    }

    async fn read_versioned(&self) -> Result<(Option<Snapshot>, u64)> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let loaded = load_snapshot(&mut *tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(loaded)
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<u64> {
        self.write_fields(&SnapshotPatch::from(snapshot), None).await
    }

    async fn write_fields(
        &self,
        patch: &SnapshotPatch,
        expected_version: Option<u64>,
    ) -> Result<u64> {
        let values = patch.to_field_values()?;
        let now = self.time_provider.now_millis();
        let expected = expected_version.map(|v| v as i64);

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("INSERT OR IGNORE INTO store_meta (id, version) VALUES (1, 0)")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let bumped: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE store_meta
            SET version = version + 1
            WHERE id = 1
              AND (? IS NULL OR version = ?)
            RETURNING version
            "#,
        )
        .bind(expected)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(version) = bumped.map(to_version) else {
            let actual: i64 = sqlx::query_scalar("SELECT version FROM store_meta WHERE id = 1")
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(AppError::StaleSnapshot {
                expected: expected_version.unwrap_or(0),
                actual: to_version(actual),
            });
        };

        for (field, value) in &values {
            sqlx::query(
                r#"
                INSERT INTO store_fields (field, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(field) DO UPDATE
                SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(*field)
            .bind(value.to_string())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        let (snapshot, _) = load_snapshot(&mut *tx).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(
            version,
            fields = ?values.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
            "Snapshot fields written"
        );
        self.publish(snapshot, version);
        Ok(version)
    }

    fn subscribe(&self) -> SnapshotWatch {
        self.tx.subscribe()
    }

    async fn destroy(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM store_fields")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE store_meta SET version = version + 1 WHERE id = 1 RETURNING version",
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        let version = version.map(to_version).unwrap_or(0);
        info!(version, "Snapshot store destroyed");
        self.publish(None, version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chrono::DateTime;
    use tokio_test::assert_ok;
    use upnext_core::application::shutdown_channel;
    use upnext_core::domain::{Action, HistoryEvent, Rep};
    use upnext_core::port::FixedTimeProvider;

    async fn setup_pool() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    async fn open(pool: &SqlitePool) -> SqliteSnapshotStore {
        SqliteSnapshotStore::open(pool.clone(), Arc::new(FixedTimeProvider::new(1_000)))
            .await
            .unwrap()
    }

    fn queue_patch(queue: Vec<i64>) -> SnapshotPatch {
        SnapshotPatch {
            queue: Some(queue),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_store_reads_none() {
        let pool = setup_pool().await;
        let store = open(&pool).await;

        assert!(store.read().await.unwrap().is_none());
        assert!(store.subscribe().borrow().is_none());
    }

    #[tokio::test]
    async fn test_write_and_read_full_snapshot() {
        let pool = setup_pool().await;
        let store = open(&pool).await;
        let snapshot = Snapshot {
            reps: vec![Rep::new(1, "Alice").unwrap(), Rep::new(2, "Bob").unwrap()],
            queue: vec![2, 1],
            with_customer: vec![2],
            history: vec![HistoryEvent {
                id: 1_000,
                rep_id: 2,
                rep_name: "Bob".to_string(),
                action: Action::WithCustomer,
                timestamp: DateTime::from_timestamp_millis(1_000).unwrap(),
            }],
            is_setup_complete: true,
            ..Default::default()
        };

        let version = assert_ok!(store.write(&snapshot).await);
        let stored = store.read().await.unwrap().unwrap();

        assert_eq!(version, 1);
        assert_eq!(
            stored,
            Snapshot {
                version: 1,
                ..snapshot
            }
        );
    }

    #[tokio::test]
    async fn test_field_writes_leave_other_fields_alone() {
        let pool = setup_pool().await;
        let first = open(&pool).await;
        let second = open(&pool).await;

        first.write_fields(&queue_patch(vec![1, 2]), None).await.unwrap();
        second
            .write_fields(
                &SnapshotPatch {
                    stepped_away: Some(vec![2]),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let stored = first.read().await.unwrap().unwrap();
        assert_eq!(stored.queue, vec![1, 2]);
        assert_eq!(stored.stepped_away, vec![2]);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_same_field_last_writer_wins() {
        let pool = setup_pool().await;
        let store = open(&pool).await;

        store.write_fields(&queue_patch(vec![1]), None).await.unwrap();
        store.write_fields(&queue_patch(vec![2]), None).await.unwrap();

        assert_eq!(store.read().await.unwrap().unwrap().queue, vec![2]);
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_rejected() {
        let pool = setup_pool().await;
        let store = open(&pool).await;
        store.write_fields(&queue_patch(vec![1]), Some(0)).await.unwrap();
        store.write_fields(&queue_patch(vec![1, 2]), Some(1)).await.unwrap();

        let err = store
            .write_fields(&queue_patch(vec![9]), Some(1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::StaleSnapshot {
                expected: 1,
                actual: 2
            }
        ));
        let stored = store.read().await.unwrap().unwrap();
        assert_eq!(stored.queue, vec![1, 2]);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_destroy_clears_everything() {
        let pool = setup_pool().await;
        let store = open(&pool).await;
        store.write_fields(&queue_patch(vec![1]), None).await.unwrap();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.destroy().await.unwrap();

        assert!(store.read().await.unwrap().is_none());
        assert_eq!(store.read_versioned().await.unwrap(), (None, 2));
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());

        // Counter keeps going
        let version = store.write_fields(&queue_patch(vec![1]), None).await.unwrap();
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn test_write_based_on_pre_destroy_read_is_stale() {
        let pool = setup_pool().await;
        let store = open(&pool).await;
        let before_reset = store.write_fields(&queue_patch(vec![1]), None).await.unwrap();

        store.destroy().await.unwrap();
        store
            .write_fields(
                &SnapshotPatch {
                    is_setup_complete: Some(true),
                    ..Default::default()
                },
                Some(2),
            )
            .await
            .unwrap();

        let err = store
            .write_fields(&queue_patch(vec![2]), Some(before_reset))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::StaleSnapshot {
                expected: 1,
                actual: 3
            }
        ));
        assert!(store.read().await.unwrap().unwrap().queue.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_settles_after_foreign_destroy() {
        let pool = setup_pool().await;
        let local = open(&pool).await;
        let remote = open(&pool).await;
        remote.write_fields(&queue_patch(vec![4]), None).await.unwrap();
        assert!(local.refresh().await.unwrap());

        remote.destroy().await.unwrap();

        assert!(local.refresh().await.unwrap());
        assert!(local.subscribe().borrow().is_none());
        assert!(!local.refresh().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_and_null_fields_read_as_empty() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO store_meta (id, version) VALUES (1, 3)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO store_fields (field, value, updated_at) VALUES ('queue', 'null', 0), ('legacyField', '42', 0)")
            .execute(&pool)
            .await
            .unwrap();

        let store = open(&pool).await;
        let stored = store.read().await.unwrap().unwrap();

        assert!(stored.queue.is_empty());
        assert!(stored.reps.is_empty());
        assert!(!stored.is_setup_complete);
        assert_eq!(stored.version, 3);
    }

    #[tokio::test]
    async fn test_corrupt_field_is_serialization_error() {
        let pool = setup_pool().await;
        sqlx::query("INSERT INTO store_fields (field, value, updated_at) VALUES ('queue', '[1,', 0)")
            .execute(&pool)
            .await
            .unwrap();
        let store = SqliteSnapshotStore {
            pool: pool.clone(),
            time_provider: Arc::new(FixedTimeProvider::new(0)),
            tx: watch::channel(None).0,
            published_version: AtomicU64::new(0),
        };

        let err = store.read().await.unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_refresh_publishes_foreign_writes() {
        let pool = setup_pool().await;
        let local = open(&pool).await;
        let remote = open(&pool).await;

        assert!(!local.refresh().await.unwrap());

        remote.write_fields(&queue_patch(vec![4]), None).await.unwrap();
        assert!(local.refresh().await.unwrap());
        assert!(!local.refresh().await.unwrap());

        let seen = local.subscribe().borrow().clone().unwrap();
        assert_eq!(seen.queue, vec![4]);
        assert_eq!(seen.version, 1);
    }

    #[tokio::test]
    async fn test_change_poller_stops_on_shutdown() {
        let pool = setup_pool().await;
        let local = Arc::new(open(&pool).await);
        let remote = open(&pool).await;
        let mut rx = local.subscribe();
        let (shutdown_tx, shutdown) = shutdown_channel();

        let poller = local
            .clone()
            .spawn_change_poller(Duration::from_millis(10), shutdown);

        remote.write_fields(&queue_patch(vec![5]), None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().queue, vec![5]);

        shutdown_tx.shutdown();
        tokio::time::timeout(Duration::from_secs(2), poller)
            .await
            .unwrap()
            .unwrap();
    }
}
