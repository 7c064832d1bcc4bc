//! Concurrent directory of groups, users, and the bot's own identity.
//!
//! Written wholesale by the polling loop once per refresh cycle and read by
//! arbitrary handler threads. One mutex guards the group/user map pair so a
//! reader always observes both maps from the same generation — never a group
//! map from one refresh paired with a user map from another. Entries are
//! replaced, not merged: a group absent from the latest fetch disappears.

use crate::error::{Result, VigilError};
use crate::tracker::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// One tracked user. `active` is recomputed from scratch every poll cycle
/// and never merged with a prior value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Opaque upstream id.
    pub id: UserId,
    /// Login name.
    pub login: String,
    /// Full display name.
    pub display_name: String,
    /// Avatar URL.
    pub avatar: String,
    /// Whether the latest presence lookup returned the active signal.
    pub active: bool,
}

/// One tracked group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Opaque upstream id.
    pub id: String,
    /// Mention handle the group is queried by.
    pub handle: String,
    /// Member user ids, in upstream order.
    pub member_ids: Vec<UserId>,
}

/// A resolved group query result: the group plus its members' current
/// `User` records.
#[derive(Debug, Clone)]
pub struct GroupView {
    /// The group as of the latest refresh.
    pub group: Group,
    /// Resolved members. Ids with no current user record are dropped (they
    /// resolve on a later cycle); the list may be truncated by a per-group
    /// limit.
    pub members: Vec<User>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    groups: HashMap<String, Group>,
    users: HashMap<UserId, User>,
}

/// Thread-safe registry of the latest groups/users/bot-identity view.
///
/// Single writer (the poller), many concurrent readers. `replace` is
/// linearizable with respect to the query methods.
#[derive(Debug, Default)]
pub struct SharedDirectory {
    state: Mutex<DirectoryState>,
    bot: Mutex<Option<User>>,
}

impl SharedDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly built generation of groups and users.
    ///
    /// Both maps change inside a single critical section; prior contents are
    /// discarded entirely.
    pub fn replace(&self, groups: Vec<Group>, users: Vec<User>) {
        let mut state = lock(&self.state);
        state.groups = groups.into_iter().map(|g| (g.handle.clone(), g)).collect();
        state.users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
    }

    /// Record the bot's own upstream identity. Written once after discovery.
    pub fn set_bot_identity(&self, user: User) {
        *lock(&self.bot) = Some(user);
    }

    /// The bot's own identity, if discovered yet.
    #[must_use]
    pub fn bot_identity(&self) -> Option<User> {
        lock(&self.bot).clone()
    }

    /// Resolve the requested group handles to their current members.
    ///
    /// `per_group_limit` optionally caps the member list per handle;
    /// truncation happens after unresolvable member ids are dropped.
    ///
    /// # Errors
    ///
    /// [`VigilError::UnknownGroup`] naming the first handle with no current
    /// group. Earlier handles in the same request resolve normally; later
    /// ones are not examined.
    pub fn query_groups(
        &self,
        handles: &[String],
        per_group_limit: Option<&HashMap<String, usize>>,
    ) -> Result<Vec<GroupView>> {
        let state = lock(&self.state);
        let mut views = Vec::with_capacity(handles.len());
        for handle in handles {
            let group = state
                .groups
                .get(handle)
                .ok_or_else(|| VigilError::UnknownGroup {
                    handle: handle.clone(),
                })?;
            let mut members: Vec<User> = group
                .member_ids
                .iter()
                .filter_map(|id| state.users.get(id).cloned())
                .collect();
            if let Some(limit) = per_group_limit.and_then(|limits| limits.get(handle)) {
                members.truncate(*limit);
            }
            views.push(GroupView {
                group: group.clone(),
                members,
            });
        }
        Ok(views)
    }

    /// All currently known group handles, sorted for stable display.
    #[must_use]
    pub fn list_handles(&self) -> Vec<String> {
        let state = lock(&self.state);
        let mut handles: Vec<String> = state.groups.keys().cloned().collect();
        handles.sort();
        handles
    }
}

// A poisoned lock only means another reader panicked mid-read; the protected
// maps are still internally consistent (replace swaps whole values).
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Arc;

    fn user(id: &str, active: bool) -> User {
        User {
            id: id.to_owned(),
            login: id.to_lowercase(),
            display_name: format!("User {id}"),
            avatar: String::new(),
            active,
        }
    }

    fn group(handle: &str, member_ids: &[&str]) -> Group {
        Group {
            id: format!("S-{handle}"),
            handle: handle.to_owned(),
            member_ids: member_ids.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn query_resolves_members_in_group_order() {
        let dir = SharedDirectory::new();
        dir.replace(
            vec![group("coreteam", &["U2", "U1"])],
            vec![user("U1", false), user("U2", true)],
        );

        let views = dir.query_groups(&["coreteam".to_owned()], None).unwrap();
        assert!(views.len() == 1);
        let members = &views[0].members;
        assert!(members.len() == 2);
        assert!(members[0].id == "U2");
        assert!(members[1].id == "U1");
        assert!(members[0].active);
        assert!(!members[1].active);
    }

    #[test]
    fn unknown_handle_names_exactly_the_missing_one() {
        let dir = SharedDirectory::new();
        dir.replace(vec![group("coreteam", &["U1"])], vec![user("U1", false)]);

        let handles = vec!["coreteam".to_owned(), "ghostteam".to_owned()];
        let err = dir.query_groups(&handles, None).unwrap_err();
        match err {
            VigilError::UnknownGroup { handle } => assert!(handle == "ghostteam"),
            other => unreachable!("expected UnknownGroup, got {other:?}"),
        }

        // The sibling handle still resolves on its own.
        let views = dir.query_groups(&handles[..1], None).unwrap();
        assert!(views[0].group.handle == "coreteam");
    }

    #[test]
    fn unresolvable_member_ids_are_dropped_silently() {
        let dir = SharedDirectory::new();
        // U9 is in the group but has no user record yet.
        dir.replace(vec![group("coreteam", &["U1", "U9"])], vec![user("U1", true)]);

        let views = dir.query_groups(&["coreteam".to_owned()], None).unwrap();
        assert!(views[0].members.len() == 1);
        assert!(views[0].members[0].id == "U1");
        // The raw group still lists both ids.
        assert!(views[0].group.member_ids.len() == 2);
    }

    #[test]
    fn per_group_limit_truncates_after_resolution() {
        let dir = SharedDirectory::new();
        dir.replace(
            vec![group("bigteam", &["U1", "U2", "U3"])],
            vec![user("U1", false), user("U2", false), user("U3", false)],
        );

        let mut limits = HashMap::new();
        limits.insert("bigteam".to_owned(), 2);
        let views = dir
            .query_groups(&["bigteam".to_owned()], Some(&limits))
            .unwrap();
        assert!(views[0].members.len() == 2);
        assert!(views[0].members[0].id == "U1");
        assert!(views[0].members[1].id == "U2");
    }

    #[test]
    fn replace_is_wholesale_not_merged() {
        let dir = SharedDirectory::new();
        dir.replace(
            vec![group("oldteam", &["U1"])],
            vec![user("U1", false)],
        );
        dir.replace(vec![group("newteam", &["U2"])], vec![user("U2", false)]);

        assert!(dir.list_handles() == vec!["newteam".to_owned()]);
        let err = dir.query_groups(&["oldteam".to_owned()], None).unwrap_err();
        assert!(matches!(err, VigilError::UnknownGroup { .. }));
    }

    #[test]
    fn bot_identity_round_trip() {
        let dir = SharedDirectory::new();
        assert!(dir.bot_identity().is_none());
        dir.set_bot_identity(user("UBOT", false));
        assert!(dir.bot_identity().unwrap().id == "UBOT");
    }

    #[test]
    fn list_handles_is_sorted() {
        let dir = SharedDirectory::new();
        dir.replace(
            vec![group("zeta", &[]), group("alpha", &[]), group("mid", &[])],
            vec![],
        );
        let handles = dir.list_handles();
        assert!(handles == vec!["alpha".to_owned(), "mid".to_owned(), "zeta".to_owned()]);
    }

    #[test]
    fn replace_never_exposes_mixed_generations() {
        // Each generation tags both the group and its member's login with the
        // same number; a torn read would pair them up inconsistently.
        let dir = Arc::new(SharedDirectory::new());
        let writer_dir = Arc::clone(&dir);

        let writer = std::thread::spawn(move || {
            for generation in 0..500u32 {
                let g = Group {
                    id: generation.to_string(),
                    handle: "team".to_owned(),
                    member_ids: vec!["member".to_owned()],
                };
                let u = User {
                    id: "member".to_owned(),
                    login: generation.to_string(),
                    display_name: String::new(),
                    avatar: String::new(),
                    active: false,
                };
                writer_dir.replace(vec![g], vec![u]);
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let dir = Arc::clone(&dir);
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        match dir.query_groups(&["team".to_owned()], None) {
                            Ok(views) => {
                                let view = &views[0];
                                assert!(view.members.len() == 1);
                                assert!(view.group.id == view.members[0].login);
                            }
                            // Before the first replace the handle is unknown.
                            Err(VigilError::UnknownGroup { .. }) => {}
                            Err(other) => unreachable!("unexpected error: {other:?}"),
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
