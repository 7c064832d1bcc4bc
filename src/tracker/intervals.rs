//! In-memory per-user activity interval histories.
//!
//! Each user owns an ordered list of `[start, end]` intervals during which
//! they were continuously active, plus membership in the current active set.
//! A user is active iff their most recent interval is still open (being
//! extended by each active observation). Histories are append-only except
//! for that open interval's `end`.

use crate::error::{Result, VigilError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Opaque upstream user identifier.
pub type UserId = String;

/// One continuous active period, `start <= end` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// When the active period began.
    pub start: DateTime<Utc>,
    /// Last observation time while still active, or the close time.
    pub end: DateTime<Utc>,
}

impl Interval {
    /// A zero-length interval opened at `at`.
    #[must_use]
    pub fn point(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }
}

/// Per-user interval histories plus the current active set.
///
/// Single-writer by construction: only the polling loop mutates this, so it
/// carries no internal locking.
#[derive(Debug, Default)]
pub struct IntervalStore {
    active: HashSet<UserId>,
    histories: HashMap<UserId, Vec<Interval>>,
}

impl IntervalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously persisted parts. No gap correction
    /// happens here; that is the caller's decision.
    #[must_use]
    pub fn from_parts(
        active: HashSet<UserId>,
        histories: HashMap<UserId, Vec<Interval>>,
    ) -> Self {
        Self { active, histories }
    }

    /// Apply one observation batch taken at `at`.
    ///
    /// Ids in `active_ids` extend their open interval (or open a new one);
    /// ids in `inactive_ids` that are currently active get their interval
    /// closed at `at`. Inactive ids that were not active are no-ops. The two
    /// sets are disjoint by contract; if an id appears in both, the active
    /// branch runs first and the inactive branch then closes it — no panic
    /// either way.
    ///
    /// # Errors
    ///
    /// [`VigilError::ClockInvariantViolation`] if extending an interval to
    /// `at` would put its end before its start. That means a caller bug or a
    /// backward clock and is never silently corrected.
    pub fn record_observation(
        &mut self,
        active_ids: &HashSet<UserId>,
        inactive_ids: &HashSet<UserId>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        for id in active_ids {
            if self.active.contains(id) {
                self.extend_open_interval(id, at)?;
            } else {
                self.histories
                    .entry(id.clone())
                    .or_default()
                    .push(Interval::point(at));
                self.active.insert(id.clone());
            }
        }

        for id in inactive_ids {
            if self.active.contains(id) {
                self.extend_open_interval(id, at)?;
                self.active.remove(id);
            }
        }

        Ok(())
    }

    /// Whether `id` is currently active (open interval being extended).
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    /// The current active set.
    #[must_use]
    pub fn active_ids(&self) -> &HashSet<UserId> {
        &self.active
    }

    /// The interval history for one user, oldest first.
    #[must_use]
    pub fn history(&self, id: &str) -> Option<&[Interval]> {
        self.histories.get(id).map(Vec::as_slice)
    }

    /// All histories.
    #[must_use]
    pub fn histories(&self) -> &HashMap<UserId, Vec<Interval>> {
        &self.histories
    }

    fn extend_open_interval(&mut self, id: &UserId, at: DateTime<Utc>) -> Result<()> {
        let history = self.histories.entry(id.clone()).or_default();
        match history.last_mut() {
            Some(last) => {
                if last.start > at {
                    return Err(VigilError::ClockInvariantViolation {
                        user_id: id.clone(),
                        start: last.start,
                        at,
                    });
                }
                last.end = at;
            }
            // Active set said open, but no interval exists. Recover by
            // opening one, matching how a fresh activation is recorded.
            None => history.push(Interval::point(at)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 15, hour, 0, 0).unwrap()
    }

    fn ids(list: &[&str]) -> HashSet<UserId> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn two_sessions_produce_two_closed_intervals() {
        // Scenario: active@13, inactive@14, active@15, inactive@16.
        let mut store = IntervalStore::new();
        store.record_observation(&ids(&["u"]), &ids(&[]), ts(13)).unwrap();
        store.record_observation(&ids(&[]), &ids(&["u"]), ts(14)).unwrap();
        store.record_observation(&ids(&["u"]), &ids(&[]), ts(15)).unwrap();
        store.record_observation(&ids(&[]), &ids(&["u"]), ts(16)).unwrap();

        let history = store.history("u").unwrap();
        assert!(
            history
                == [
                    Interval { start: ts(13), end: ts(14) },
                    Interval { start: ts(15), end: ts(16) },
                ]
        );
        assert!(!store.is_active("u"));
    }

    #[test]
    fn repeated_active_observations_extend_one_interval() {
        let mut store = IntervalStore::new();
        for hour in 13..16 {
            store.record_observation(&ids(&["u"]), &ids(&[]), ts(hour)).unwrap();
        }

        let history = store.history("u").unwrap();
        assert!(history.len() == 1);
        assert!(history[0] == Interval { start: ts(13), end: ts(15) });
        assert!(store.is_active("u"));
    }

    #[test]
    fn inactive_observation_for_unknown_user_is_a_no_op() {
        let mut store = IntervalStore::new();
        store.record_observation(&ids(&[]), &ids(&["ghost"]), ts(13)).unwrap();
        assert!(store.history("ghost").is_none());
        assert!(!store.is_active("ghost"));
    }

    #[test]
    fn histories_stay_sorted_and_non_overlapping() {
        let mut store = IntervalStore::new();
        let sequence: &[(&[&str], &[&str])] = &[
            (&["u", "v"], &[]),
            (&["u"], &["v"]),
            (&["u", "v"], &[]),
            (&[], &["u", "v"]),
            (&["v"], &[]),
        ];
        for (hour, (active, inactive)) in sequence.iter().enumerate() {
            store
                .record_observation(&ids(active), &ids(inactive), ts(13 + hour as u32))
                .unwrap();
        }

        for history in store.histories().values() {
            for interval in history {
                assert!(interval.start <= interval.end);
            }
            for pair in history.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
        }
    }

    #[test]
    fn backward_clock_is_a_fatal_invariant_violation() {
        let mut store = IntervalStore::new();
        store.record_observation(&ids(&["u"]), &ids(&[]), ts(15)).unwrap();

        let err = store
            .record_observation(&ids(&["u"]), &ids(&[]), ts(13))
            .unwrap_err();
        match err {
            VigilError::ClockInvariantViolation { user_id, start, at } => {
                assert!(user_id == "u");
                assert!(start == ts(15));
                assert!(at == ts(13));
            }
            other => unreachable!("expected ClockInvariantViolation, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_observation_sets_do_not_panic() {
        // Contract violation: "u" reported both active and inactive. The
        // active branch runs first, then the close; the user ends inactive
        // with a consistent history.
        let mut store = IntervalStore::new();
        store.record_observation(&ids(&["u"]), &ids(&["u"]), ts(13)).unwrap();

        assert!(!store.is_active("u"));
        let history = store.history("u").unwrap();
        assert!(history == [Interval { start: ts(13), end: ts(13) }]);
    }

    #[test]
    fn closing_extends_the_interval_to_the_close_time() {
        let mut store = IntervalStore::new();
        store.record_observation(&ids(&["u"]), &ids(&[]), ts(13)).unwrap();
        store.record_observation(&ids(&[]), &ids(&["u"]), ts(14)).unwrap();

        let history = store.history("u").unwrap();
        assert!(history == [Interval { start: ts(13), end: ts(14) }]);
    }
}
