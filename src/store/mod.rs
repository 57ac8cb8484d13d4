//! Remote store adapter: the collection at path `goals`, keyed by goal id.

pub mod sqlite;

use crate::error::StoreError;
use crate::models::goal::{GoalPatch, GoalRecord, GoalWritten};
use std::collections::BTreeMap;
use tokio::sync::{broadcast, watch};

pub use sqlite::SqliteGoalStore;

/// Attempts made by `atomic_update` before reporting contention.
pub const MAX_CAS_ATTEMPTS: usize = 25;

/// Storage primitives the goal repository is written against.
///
/// Implementations must broadcast every committed write on both the change
/// revision (`watch`) and the write hook (`write_events`) in commit order, and
/// must give `atomic_update` retry-on-conflict semantics so concurrent callers
/// never lose an update.
pub trait GoalStore: Send + Sync {
    /// Flat mapping of goal id to record.
    fn snapshot(&self) -> Result<BTreeMap<String, GoalRecord>, StoreError>;

    fn get(&self, id: &str) -> Result<Option<GoalRecord>, StoreError>;

    /// Writes a new record and returns its store-assigned id.
    fn insert(&self, record: &GoalRecord) -> Result<String, StoreError>;

    fn update_fields(&self, id: &str, patch: &GoalPatch) -> Result<(), StoreError>;

    /// Replaces `current` with `apply(current)` and stamps `updated_at`, in a
    /// single conditional write. Returns the committed value. `target` has no
    /// atomic path; it only changes through `update_fields`.
    fn atomic_update(
        &self,
        id: &str,
        updated_at: i64,
        apply: &(dyn Fn(f64) -> f64 + Sync),
    ) -> Result<f64, StoreError>;

    /// Publishes commits made by other clients of the same backing store since
    /// the last poll. Returns how many goals changed.
    fn poll_external(&self) -> Result<usize, StoreError>;

    /// Receiver whose value is bumped on every committed write.
    fn watch(&self) -> watch::Receiver<u64>;

    /// Change-notification hook carrying the post-write record.
    fn write_events(&self) -> broadcast::Receiver<GoalWritten>;
}
