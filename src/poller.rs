//! Background presence polling loop.
//!
//! [`PresencePoller`] is the single writer of the whole system: it
//! periodically fetches groups, users, and per-user presence through the
//! rate limiters, publishes the result to the [`SharedDirectory`] in one
//! atomic swap, and feeds the active/inactive partition into the
//! [`ActivityTracker`].
//!
//! The loop runs on a short fixed tick and tracks elapsed time since the
//! last completed refresh separately, so the refresh cadence drifts by at
//! most one tick and never compounds. Cancellation is cooperative: the
//! token is checked between steps (and before every presence lookup), never
//! mid-call, so stopping costs at most one rate-limited call plus one tick.

use crate::config::VigilConfig;
use crate::directory::{Group, SharedDirectory, User};
use crate::error::Result;
use crate::platform::PresenceApi;
use crate::rate_limit::ApiRateLimiters;
use crate::tracker::{ActivityTracker, UserId};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Directory and tracker were updated.
    Completed,
    /// A listing fetch failed; nothing was updated and the refresh stays
    /// due, so the next tick retries.
    FetchFailed,
    /// A stop request interrupted the presence batch; nothing was updated.
    Cancelled,
}

/// The background polling scheduler. One instance, one long-lived task.
pub struct PresencePoller {
    api: Arc<dyn PresenceApi>,
    directory: Arc<SharedDirectory>,
    tracker: ActivityTracker,
    limiters: ApiRateLimiters,
    cancel: CancellationToken,
    refresh_interval: Duration,
    tick: Duration,
    bot_name: String,
    bot_user: Option<User>,
}

impl PresencePoller {
    /// Build a poller from configuration. Stop it by cancelling `cancel`
    /// (hand in a child token if the caller needs the parent for other
    /// shutdown work).
    #[must_use]
    pub fn new(
        api: Arc<dyn PresenceApi>,
        directory: Arc<SharedDirectory>,
        tracker: ActivityTracker,
        config: &VigilConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            directory,
            tracker,
            limiters: ApiRateLimiters::new(&config.rate_limits),
            cancel,
            refresh_interval: Duration::from_secs(config.poller.refresh_secs),
            tick: Duration::from_secs(config.poller.tick_secs),
            bot_name: config.bot.name.clone(),
            bot_user: None,
        }
    }

    /// Read access to the tracker (active set, histories).
    #[must_use]
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Run the polling loop until the cancellation token fires.
    ///
    /// Intended to be spawned as a background task:
    ///
    /// ```rust,ignore
    /// let poller = PresencePoller::new(api, directory, tracker, &config, cancel.child_token());
    /// tokio::spawn(poller.run());
    /// ```
    ///
    /// # Errors
    ///
    /// Transient upstream failures are absorbed and retried; only fatal
    /// conditions escape — a persistence write failure or an interval
    /// invariant violation.
    pub async fn run(mut self) -> Result<()> {
        info!(
            refresh_secs = self.refresh_interval.as_secs(),
            tick_secs = self.tick.as_secs(),
            "presence poller started"
        );
        let mut last_refresh: Option<Instant> = None;

        while !self.cancel.is_cancelled() {
            let due = last_refresh.is_none_or(|t| t.elapsed() >= self.refresh_interval);
            if due {
                match self.refresh_once().await? {
                    RefreshOutcome::Completed => last_refresh = Some(Instant::now()),
                    // Leave the refresh due so the next tick retries.
                    RefreshOutcome::FetchFailed => {}
                    RefreshOutcome::Cancelled => break,
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.tick) => {}
            }
        }

        info!("presence poller stopped");
        Ok(())
    }

    /// Execute one full refresh cycle immediately.
    ///
    /// # Errors
    ///
    /// Fatal tracker errors only; upstream failures map to
    /// [`RefreshOutcome::FetchFailed`] (listings) or are skipped per user
    /// (presence lookups).
    pub async fn refresh_once(&mut self) -> Result<RefreshOutcome> {
        self.limiters.groups.acquire().await;
        let groups = match self.api.list_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "group listing failed; keeping stale directory");
                return Ok(RefreshOutcome::FetchFailed);
            }
        };

        self.limiters.users.acquire().await;
        let users = match self.api.list_users().await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "user listing failed; keeping stale directory");
                return Ok(RefreshOutcome::FetchFailed);
            }
        };

        // Classify: cache the bot's own identity on first sight, skip
        // deleted and bot accounts, keep the rest as candidates.
        let mut candidates: HashMap<UserId, User> = HashMap::new();
        for payload in users {
            if payload.is_bot && payload.real_name.as_deref() == Some(self.bot_name.as_str()) {
                if self.bot_user.is_none() {
                    let bot = User::from(payload);
                    info!(bot_id = %bot.id, "discovered own bot identity");
                    self.directory.set_bot_identity(bot.clone());
                    self.bot_user = Some(bot);
                }
                continue;
            }
            if payload.deleted || payload.is_bot {
                continue;
            }
            let user = User::from(payload);
            candidates.insert(user.id.clone(), user);
        }

        let mut new_groups = Vec::with_capacity(groups.len());
        let mut member_ids: BTreeSet<UserId> = BTreeSet::new();
        for payload in groups {
            let group = Group::from(payload);
            member_ids.extend(group.member_ids.iter().cloned());
            new_groups.push(group);
        }

        for id in &member_ids {
            if self.cancel.is_cancelled() {
                info!("stop requested; aborting presence batch");
                return Ok(RefreshOutcome::Cancelled);
            }
            self.limiters.presence.acquire().await;
            match self.api.get_presence(id).await {
                Ok(status) if status.is_active() => {
                    // A member id without a user record stays unknown until
                    // the next cycle's listing picks it up.
                    if let Some(user) = candidates.get_mut(id) {
                        user.active = true;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(user_id = %id, error = %e, "presence lookup failed; skipping user");
                }
            }
        }

        let new_users: Vec<User> = candidates.into_values().collect();
        let mut active_ids: HashSet<UserId> = HashSet::new();
        let mut inactive_ids: HashSet<UserId> = HashSet::new();
        for user in &new_users {
            if user.active {
                active_ids.insert(user.id.clone());
            } else {
                inactive_ids.insert(user.id.clone());
            }
        }

        self.directory.replace(new_groups, new_users);
        self.tracker
            .record_observation(&active_ids, &inactive_ids, Utc::now())?;

        let mut active_sorted: Vec<&str> = active_ids.iter().map(String::as_str).collect();
        active_sorted.sort_unstable();
        info!(active = %active_sorted.join(", "), "refreshed active users");
        Ok(RefreshOutcome::Completed)
    }
}
