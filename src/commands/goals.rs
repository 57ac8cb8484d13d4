use crate::error::{GoalError, StoreError};
use crate::models::goal::{Goal, GoalPatch, GoalRecord};
use crate::store::GoalStore;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn materialize(raw: BTreeMap<String, GoalRecord>) -> Vec<Goal> {
    raw.into_iter()
        .map(|(id, record)| Goal::from_record(id, record))
        .collect()
}

fn validate(team: &str, title: &str, target: f64) -> Result<(), GoalError> {
    if team.trim().is_empty() {
        return Err(GoalError::validation("Team is required"));
    }
    if title.trim().is_empty() {
        return Err(GoalError::validation("Title is required"));
    }
    if !target.is_finite() || target <= 0.0 {
        return Err(GoalError::validation("Target must be a positive number"));
    }
    Ok(())
}

/// Typed access to the `goals` collection.
#[derive(Clone)]
pub struct GoalRepository {
    store: Arc<dyn GoalStore>,
}

impl GoalRepository {
    pub fn new(store: Arc<dyn GoalStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GoalStore> {
        &self.store
    }

    /// One-shot read of the whole collection, in store key order.
    pub async fn list(&self) -> Result<Vec<Goal>, StoreError> {
        Ok(materialize(self.store.snapshot()?))
    }

    /// Live view of the collection. The first `next()` yields the current
    /// state; each later call waits for the next committed write. The
    /// subscription does not keep the store alive.
    pub fn subscribe(&self) -> GoalSubscription {
        GoalSubscription {
            store: Arc::downgrade(&self.store),
            changes: self.store.watch(),
            primed: false,
        }
    }

    pub async fn create(&self, team: &str, title: &str, target: f64) -> Result<Goal, GoalError> {
        validate(team, title, target)?;

        let now = now_ms();
        let record = GoalRecord {
            team: team.to_string(),
            title: title.to_string(),
            target,
            current: 0.0,
            created_at: now,
            updated_at: now,
        };
        let id = self.store.insert(&record)?;
        log::info!("created goal {id} for team {team}");

        Ok(Goal::from_record(id, record))
    }

    /// Overwrites team/title/target and `updatedAt`; progress is kept.
    pub async fn update(
        &self,
        id: &str,
        team: &str,
        title: &str,
        target: f64,
    ) -> Result<(), GoalError> {
        validate(team, title, target)?;

        let patch = GoalPatch {
            team: team.to_string(),
            title: title.to_string(),
            target,
            updated_at: now_ms(),
        };
        self.store.update_fields(id, &patch)?;
        log::info!("updated goal {id}");
        Ok(())
    }

    /// Adds `amount` to `current` without losing concurrent increments.
    /// The new value and `updatedAt` land in the same conditional write.
    pub async fn increment_progress(&self, id: &str, amount: f64) -> Result<f64, GoalError> {
        if !amount.is_finite() {
            return Err(GoalError::validation("Increment must be a finite number"));
        }

        let value = self
            .store
            .atomic_update(id, now_ms(), &move |current: f64| current + amount)?;
        log::debug!("goal {id} progress now {value}");
        Ok(value)
    }
}

/// Cancellable sequence of collection snapshots.
pub struct GoalSubscription {
    store: Weak<dyn GoalStore>,
    changes: watch::Receiver<u64>,
    primed: bool,
}

impl GoalSubscription {
    /// Next full snapshot, or `None` once every repository holding the store
    /// has been dropped.
    pub async fn next(&mut self) -> Option<Result<Vec<Goal>, StoreError>> {
        if self.primed {
            self.changes.changed().await.ok()?;
        } else {
            self.primed = true;
        }
        // Acknowledge everything up to now; bursts collapse into one snapshot.
        let _ = self.changes.borrow_and_update();

        let store = self.store.upgrade()?;
        Some(store.snapshot().map(materialize))
    }

    /// Stops delivery and releases the underlying watch handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
