//! Activity tracking: interval histories plus crash-tolerant persistence.
//!
//! [`ActivityTracker`] composes the in-memory [`IntervalStore`] with a
//! [`SnapshotStore`] into one transactional unit: every recorded observation
//! is immediately persisted, so there is no separate flush or checkpoint
//! step to forget.

pub mod intervals;
pub mod snapshot;

pub use intervals::{Interval, IntervalStore, UserId};
pub use snapshot::{Snapshot, SnapshotStore};

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Snapshots older than this on reload are assumed to span a real process
/// downtime: all previously-active intervals are closed at the saved
/// timestamp instead of being extended across the gap.
const GAP_THRESHOLD_MINUTES: i64 = 10;

/// Interval histories with durability after every mutation.
///
/// Single-writer: only the polling loop may call
/// [`record_observation`](Self::record_observation). Readers of the history
/// go through the accessors on whatever thread owns the tracker.
#[derive(Debug)]
pub struct ActivityTracker {
    store: IntervalStore,
    persistence: SnapshotStore,
}

impl ActivityTracker {
    /// Create an empty tracker that will persist to `persistence`, without
    /// reading any existing snapshot.
    #[must_use]
    pub fn new(persistence: SnapshotStore) -> Self {
        Self {
            store: IntervalStore::new(),
            persistence,
        }
    }

    /// Create a tracker, restoring state from storage when a snapshot
    /// exists. A missing snapshot is a cold start and yields an empty
    /// tracker.
    ///
    /// If the snapshot is older than the downtime threshold, every user it
    /// recorded as active is closed at the snapshot's own timestamp before
    /// the state is accepted — no activity is fabricated for the gap. The
    /// corrected state is persisted right away.
    ///
    /// # Errors
    ///
    /// [`VigilError::CorruptSnapshot`](crate::VigilError::CorruptSnapshot)
    /// if a snapshot exists but cannot be decoded, plus any persistence
    /// failure from writing back a gap correction.
    pub fn load(persistence: SnapshotStore) -> Result<Self> {
        let mut tracker = Self::new(persistence);
        let Some(snapshot) = tracker.persistence.load()? else {
            return Ok(tracker);
        };

        let saved_at = snapshot.now;
        tracker.store = IntervalStore::from_parts(
            snapshot.active_users.into_iter().collect(),
            snapshot.user_to_time_ranges,
        );

        let age = Utc::now().signed_duration_since(saved_at);
        if age > chrono::Duration::minutes(GAP_THRESHOLD_MINUTES) {
            // Nothing to close (and no snapshot rewrite) when nobody was
            // active at save time.
            let stale: HashSet<UserId> = tracker.store.active_ids().iter().cloned().collect();
            if !stale.is_empty() {
                info!(
                    stale_users = stale.len(),
                    saved_at = %saved_at,
                    "snapshot predates downtime threshold; closing stale intervals"
                );
                tracker.record_observation(&HashSet::new(), &stale, saved_at)?;
            }
        }
        Ok(tracker)
    }

    /// Record one observation batch and persist the result immediately.
    ///
    /// # Errors
    ///
    /// Interval-invariant violations from the store, and persistence
    /// failures, both propagate unmasked.
    pub fn record_observation(
        &mut self,
        active_ids: &HashSet<UserId>,
        inactive_ids: &HashSet<UserId>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store.record_observation(active_ids, inactive_ids, at)?;
        self.persistence.save(&self.snapshot(Utc::now()))
    }

    /// Whether `id` is currently active.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.store.is_active(id)
    }

    /// The current active set.
    #[must_use]
    pub fn active_ids(&self) -> &HashSet<UserId> {
        self.store.active_ids()
    }

    /// The interval history for one user, oldest first.
    #[must_use]
    pub fn history(&self, id: &str) -> Option<&[Interval]> {
        self.store.history(id)
    }

    /// All interval histories.
    #[must_use]
    pub fn histories(&self) -> &HashMap<UserId, Vec<Interval>> {
        self.store.histories()
    }

    fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        let mut active_users: Vec<UserId> = self.store.active_ids().iter().cloned().collect();
        active_users.sort();
        Snapshot {
            active_users,
            user_to_time_ranges: self.store.histories().clone(),
            now,
        }
    }
}
