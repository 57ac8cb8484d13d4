use super::{GoalStore, MAX_CAS_ATTEMPTS};
use crate::error::StoreError;
use crate::models::goal::{GoalPatch, GoalRecord, GoalWritten};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};

const DB_SCHEMA_VERSION: i64 = 2;
const WRITE_EVENT_CAPACITY: usize = 256;

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Future schema; do not fail reads/writes for forward-compatible changes.
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS goals (
            id TEXT PRIMARY KEY,
            team TEXT NOT NULL,
            title TEXT NOT NULL,
            target REAL NOT NULL,
            current_value REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_goals_created_at ON goals(created_at);
        CREATE INDEX IF NOT EXISTS idx_goals_team ON goals(team);
        ",
    )
}

fn record_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<GoalRecord> {
    Ok(GoalRecord {
        team: row.get(offset)?,
        title: row.get(offset + 1)?,
        target: row.get(offset + 2)?,
        current: row.get(offset + 3)?,
        created_at: row.get(offset + 4)?,
        updated_at: row.get(offset + 5)?,
    })
}

/// Record plus its revision.
fn read_record(conn: &Connection, id: &str) -> rusqlite::Result<Option<(GoalRecord, i64)>> {
    conn.query_row(
        "SELECT team, title, target, current_value, created_at, updated_at, revision FROM goals WHERE id = ?1",
        params![id],
        |row| Ok((record_from_row(row, 0)?, row.get(6)?)),
    )
    .optional()
}

fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "data_version", |row| row.get(0))
}

/// SQLite-backed goal collection shared by every repository in the process.
pub struct SqliteGoalStore {
    conn: Mutex<Connection>,
    revision: watch::Sender<u64>,
    writes: broadcast::Sender<GoalWritten>,
    // Last revision published per goal, plus the connection's data_version
    // at the last poll; used to detect commits from other connections.
    seen: Mutex<(HashMap<String, i64>, i64)>,
}

impl SqliteGoalStore {
    /// Opens `<workspace>/.goalboard/state.db`, creating it when missing.
    pub fn open(workspace_path: &str) -> Result<Self, StoreError> {
        let dir = Path::new(workspace_path).join(".goalboard");
        std::fs::create_dir_all(&dir)?;
        let conn = Connection::open(dir.join("state.db"))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        initialize_schema(&conn)?;
        let version = data_version(&conn)?;
        let known = {
            let mut stmt = conn.prepare("SELECT id, revision FROM goals")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            rows
        };
        let (revision, _) = watch::channel(0);
        let (writes, _) = broadcast::channel(WRITE_EVENT_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            revision,
            writes,
            seen: Mutex::new((known, version)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Called with the connection lock held so events leave in commit order.
    fn publish(&self, id: &str, record: GoalRecord, revision: i64) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.0.insert(id.to_string(), revision);
        }
        self.revision.send_modify(|rev| *rev += 1);
        // No hook subscribers is not an error.
        let _ = self.writes.send(GoalWritten {
            id: id.to_string(),
            record,
        });
    }
}

impl GoalStore for SqliteGoalStore {
    fn snapshot(&self) -> Result<BTreeMap<String, GoalRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, team, title, target, current_value, created_at, updated_at FROM goals",
        )?;

        let goals = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, record_from_row(row, 1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(goals)
    }

    fn get(&self, id: &str) -> Result<Option<GoalRecord>, StoreError> {
        let conn = self.lock()?;
        Ok(read_record(&conn, id)?.map(|(record, _)| record))
    }

    fn insert(&self, record: &GoalRecord) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO goals (id, team, title, target, current_value, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id,
                &record.team,
                &record.title,
                record.target,
                record.current,
                record.created_at,
                record.updated_at,
            ],
        )?;

        self.publish(&id, record.clone(), 0);
        drop(conn);
        Ok(id)
    }

    fn update_fields(&self, id: &str, patch: &GoalPatch) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE goals SET team = ?2, title = ?3, target = ?4, updated_at = ?5, revision = revision + 1 WHERE id = ?1",
            params![id, &patch.team, &patch.title, patch.target, patch.updated_at],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let (record, revision) =
            read_record(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        self.publish(id, record, revision);
        Ok(())
    }

    fn atomic_update(
        &self,
        id: &str,
        updated_at: i64,
        apply: &(dyn Fn(f64) -> f64 + Sync),
    ) -> Result<f64, StoreError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (value, revision) = {
                let conn = self.lock()?;
                conn.query_row(
                    "SELECT current_value, revision FROM goals WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?
            };

            let next = apply(value);

            let conn = self.lock()?;
            let changed = conn.execute(
                "UPDATE goals SET current_value = ?1, updated_at = ?2, revision = revision + 1 WHERE id = ?3 AND revision = ?4",
                params![next, updated_at, id, revision],
            )?;
            if changed == 1 {
                if let Some((record, revision)) = read_record(&conn, id)? {
                    self.publish(id, record, revision);
                }
                return Ok(next);
            }
            drop(conn);

            log::debug!("atomic update of current_value on {id} lost race at revision {revision} (attempt {attempt})");
        }

        Err(StoreError::Contention {
            id: id.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    fn poll_external(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let version = data_version(&conn)?;
        let changed = {
            let mut seen = self.seen.lock().map_err(|_| StoreError::Poisoned)?;
            if version == seen.1 {
                return Ok(0);
            }
            seen.1 = version;

            let mut stmt = conn.prepare(
                "SELECT id, team, title, target, current_value, created_at, updated_at, revision FROM goals",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        record_from_row(row, 1)?,
                        row.get::<_, i64>(7)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let changed: Vec<_> = rows
                .into_iter()
                .filter(|(id, _, revision)| seen.0.get(id) != Some(revision))
                .collect();
            changed
        };

        for (id, record, revision) in &changed {
            self.publish(id, record.clone(), *revision);
        }
        drop(conn);

        if !changed.is_empty() {
            log::debug!("picked up {} goals written by other clients", changed.len());
        }
        Ok(changed.len())
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn write_events(&self) -> broadcast::Receiver<GoalWritten> {
        self.writes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team: &str, target: f64) -> GoalRecord {
        GoalRecord {
            team: team.to_string(),
            title: "Sprint".to_string(),
            target,
            current: 0.0,
            created_at: 1_000,
            updated_at: 1_000,
        }
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn insert_assigns_unique_ids_and_round_trips() {
        let store = SqliteGoalStore::open_in_memory().expect("store");
        let a = store.insert(&record("Blue", 100.0)).expect("insert a");
        let b = store.insert(&record("Red", 50.0)).expect("insert b");
        assert_ne!(a, b);

        let loaded = store.get(&a).expect("get").expect("exists");
        assert_eq!(loaded, record("Blue", 100.0));
        assert_eq!(store.snapshot().expect("snapshot").len(), 2);
    }

    #[test]
    fn update_fields_leaves_current_untouched() {
        let store = SqliteGoalStore::open_in_memory().expect("store");
        let id = store.insert(&record("Blue", 100.0)).expect("insert");
        store
            .atomic_update(&id, 2_000, &|v: f64| v + 7.0)
            .expect("increment");

        store
            .update_fields(
                &id,
                &GoalPatch {
                    team: "Green".to_string(),
                    title: "Quarter".to_string(),
                    target: 80.0,
                    updated_at: 3_000,
                },
            )
            .expect("update");

        let loaded = store.get(&id).expect("get").expect("exists");
        assert_eq!(loaded.team, "Green");
        assert_eq!(loaded.target, 80.0);
        assert_eq!(loaded.current, 7.0);
        assert_eq!(loaded.created_at, 1_000);
        assert_eq!(loaded.updated_at, 3_000);
    }

    #[test]
    fn writes_to_unknown_ids_are_rejected() {
        let store = SqliteGoalStore::open_in_memory().expect("store");
        let patch = GoalPatch {
            team: "Blue".to_string(),
            title: "Sprint".to_string(),
            target: 10.0,
            updated_at: 1,
        };
        assert!(matches!(
            store.update_fields("missing", &patch),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.atomic_update("missing", 1, &|v: f64| v + 1.0),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn atomic_update_stamps_timestamp_in_same_write() {
        let store = SqliteGoalStore::open_in_memory().expect("store");
        let id = store.insert(&record("Blue", 100.0)).expect("insert");

        let value = store
            .atomic_update(&id, 5_000, &|v: f64| v + 40.0)
            .expect("increment");
        assert_eq!(value, 40.0);

        let loaded = store.get(&id).expect("get").expect("exists");
        assert_eq!(loaded.current, 40.0);
        assert_eq!(loaded.updated_at, 5_000);
    }

    #[test]
    fn commits_from_other_connections_are_picked_up_by_polling() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = dir.path().to_string_lossy().to_string();
        let ours = SqliteGoalStore::open(&workspace).expect("our store");
        let theirs = SqliteGoalStore::open(&workspace).expect("their store");

        let mine = ours.insert(&record("Blue", 100.0)).expect("own insert");
        assert_eq!(ours.poll_external().expect("poll"), 0);

        let mut events = ours.write_events();
        let foreign = theirs.insert(&record("Red", 50.0)).expect("foreign insert");
        theirs
            .atomic_update(&foreign, 9, &|v: f64| v + 3.0)
            .expect("foreign increment");

        assert_eq!(ours.poll_external().expect("poll"), 1);
        let event = events.try_recv().expect("forwarded event");
        assert_eq!(event.id, foreign);
        assert_eq!(event.record.current, 3.0);
        assert_ne!(event.id, mine);
        assert_eq!(ours.poll_external().expect("idle poll"), 0);
    }

    #[test]
    fn every_write_bumps_revision_and_emits_hook_event() {
        let store = SqliteGoalStore::open_in_memory().expect("store");
        let watcher = store.watch();
        let mut events = store.write_events();

        let id = store.insert(&record("Blue", 100.0)).expect("insert");
        store
            .atomic_update(&id, 2_000, &|v: f64| v + 1.0)
            .expect("increment");

        assert_eq!(*watcher.borrow(), 2);

        let first = events.try_recv().expect("insert event");
        assert_eq!(first.id, id);
        assert_eq!(first.record.current, 0.0);

        let second = events.try_recv().expect("increment event");
        assert_eq!(second.record.current, 1.0);
        assert_eq!(second.record.updated_at, 2_000);
    }

    #[test]
    fn concurrent_writers_publish_in_commit_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = dir.path().to_string_lossy().to_string();
        let store = SqliteGoalStore::open(&workspace).expect("store");
        let other = SqliteGoalStore::open(&workspace).expect("other store");
        let id = store.insert(&record("Blue", 1_000.0)).expect("insert");
        let mut events = store.write_events();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let store = &store;
                let id = &id;
                scope.spawn(move || {
                    for step in 0..4 {
                        store
                            .atomic_update(id, worker * 10 + step, &|v: f64| v + 1.0)
                            .expect("increment");
                    }
                });
            }
        });

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.record.current);
        }
        let expected: Vec<f64> = (1..=32).map(f64::from).collect();
        assert_eq!(seen, expected);

        // Only the foreign goal is picked up; the local one was recorded at
        // its latest revision.
        let foreign = other.insert(&record("Red", 5.0)).expect("foreign insert");
        assert_eq!(store.poll_external().expect("poll"), 1);
        assert_eq!(events.try_recv().expect("foreign event").id, foreign);
    }
}
