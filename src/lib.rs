//! Vigil: presence activity tracking with durable interval history.
//!
//! Vigil watches a population of users through a third-party presence
//! signal and records, per user, the historical intervals during which they
//! were active. History survives process restarts and is served to
//! concurrent readers needing a current membership/activity view.
//!
//! # Architecture
//!
//! One background writer, many readers:
//! - **Poller**: a single task fetches groups, users, and per-user presence
//!   through per-class rate limiters, then publishes the result
//! - **Directory**: the latest groups/users view, swapped wholesale each
//!   cycle and read concurrently by handler threads
//! - **Tracker**: per-user activity intervals, persisted (gzip JSON) after
//!   every mutation; stale snapshots are gap-corrected on reload
//!
//! The upstream platform is reached only through the [`PresenceApi`] trait;
//! transport, sessions, and message handling belong to the embedding
//! application.

pub mod config;
pub mod directory;
pub mod error;
pub mod platform;
pub mod poller;
pub mod rate_limit;
pub mod tracker;

pub use config::VigilConfig;
pub use directory::{Group, GroupView, SharedDirectory, User};
pub use error::{Result, VigilError};
pub use platform::{GroupPayload, PresenceApi, PresenceStatus, ProfilePayload, UserPayload};
pub use poller::{PresencePoller, RefreshOutcome};
pub use rate_limit::{ApiRateLimiters, RateLimiter};
pub use tracker::{ActivityTracker, Interval, IntervalStore, Snapshot, SnapshotStore, UserId};
