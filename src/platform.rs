//! Upstream presence/directory collaborator interface.
//!
//! The tracker never talks to the platform directly. Implementors of
//! [`PresenceApi`] own the transport, sessions, and timeouts; this module
//! only fixes the payload shapes and the error contract. Payloads are parsed
//! into explicit structs so a missing or mistyped field fails at the
//! deserialization boundary, not on first access.

use crate::directory::{Group, User};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One group as returned by the upstream group listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupPayload {
    /// Opaque upstream group id.
    pub id: String,
    /// Mention handle (e.g. `coreteam`).
    pub handle: String,
    /// Member user ids, in upstream order. Absent means empty.
    #[serde(default)]
    pub users: Vec<String>,
}

/// Profile block nested inside a user listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfilePayload {
    /// Full display name.
    #[serde(default)]
    pub real_name: String,
    /// 48px avatar URL.
    #[serde(default)]
    pub image_48: String,
}

/// One user as returned by the upstream user listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserPayload {
    /// Opaque upstream user id.
    pub id: String,
    /// Login name.
    pub name: String,
    /// Account has been deactivated upstream.
    #[serde(default)]
    pub deleted: bool,
    /// Account is a bot integration.
    #[serde(default)]
    pub is_bot: bool,
    /// Top-level display name. Bots report their published identity here;
    /// it is what the poller matches against its own configured name.
    #[serde(default)]
    pub real_name: Option<String>,
    /// Profile block; absent on some bot/system accounts.
    #[serde(default)]
    pub profile: Option<ProfilePayload>,
}

/// Presence token for one user. The upstream contract is a bare string:
/// `"active"` means active, anything else is treated as inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceStatus(String);

impl PresenceStatus {
    /// The token value signalling an active user.
    pub const ACTIVE: &'static str = "active";

    /// Wrap a raw upstream token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Whether this token signals an active user.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0 == Self::ACTIVE
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Upstream directory/presence contract. One implementation per platform;
/// the poller only ever sees this trait.
#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// List all groups with their member ids.
    ///
    /// # Errors
    ///
    /// [`VigilError::TransientFetch`](crate::VigilError::TransientFetch) on
    /// any network/API failure; the caller abandons the whole refresh cycle.
    async fn list_groups(&self) -> Result<Vec<GroupPayload>>;

    /// List all users.
    ///
    /// # Errors
    ///
    /// [`VigilError::TransientFetch`](crate::VigilError::TransientFetch) on
    /// any network/API failure; the caller abandons the whole refresh cycle.
    async fn list_users(&self) -> Result<Vec<UserPayload>>;

    /// Look up the presence token for one user.
    ///
    /// # Errors
    ///
    /// [`VigilError::TransientLookup`](crate::VigilError::TransientLookup)
    /// on failure; the caller skips this user and continues the batch.
    async fn get_presence(&self, user_id: &str) -> Result<PresenceStatus>;
}

impl From<UserPayload> for User {
    fn from(payload: UserPayload) -> Self {
        let (display_name, avatar) = match payload.profile {
            Some(profile) => (profile.real_name, profile.image_48),
            None => (payload.real_name.unwrap_or_default(), String::new()),
        };
        Self {
            id: payload.id,
            login: payload.name,
            display_name,
            avatar,
            active: false,
        }
    }
}

impl From<GroupPayload> for Group {
    fn from(payload: GroupPayload) -> Self {
        Self {
            id: payload.id,
            handle: payload.handle,
            member_ids: payload.users,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_group_payload() {
        let json = r#"{"id": "S01", "handle": "coreteam", "users": ["U1", "U2"]}"#;
        let group: GroupPayload = serde_json::from_str(json).unwrap();
        assert!(group.id == "S01");
        assert!(group.handle == "coreteam");
        assert!(group.users == vec!["U1".to_owned(), "U2".to_owned()]);
    }

    #[test]
    fn group_payload_members_default_empty() {
        let json = r#"{"id": "S02", "handle": "emptyteam"}"#;
        let group: GroupPayload = serde_json::from_str(json).unwrap();
        assert!(group.users.is_empty());
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        // No `handle` — must fail at the boundary, not on first access.
        let json = r#"{"id": "S03", "users": []}"#;
        assert!(serde_json::from_str::<GroupPayload>(json).is_err());
    }

    #[test]
    fn parses_user_payload_with_profile() {
        let json = r#"{
            "id": "U1",
            "name": "ada",
            "deleted": false,
            "is_bot": false,
            "profile": {"real_name": "Ada Lovelace", "image_48": "https://avatars/ada.png"}
        }"#;
        let payload: UserPayload = serde_json::from_str(json).unwrap();
        let user = User::from(payload);
        assert!(user.id == "U1");
        assert!(user.login == "ada");
        assert!(user.display_name == "Ada Lovelace");
        assert!(user.avatar == "https://avatars/ada.png");
        assert!(!user.active);
    }

    #[test]
    fn user_without_profile_falls_back_to_top_level_name() {
        let json = r#"{"id": "UB", "name": "botuser", "is_bot": true, "real_name": "ActiveUsers"}"#;
        let payload: UserPayload = serde_json::from_str(json).unwrap();
        assert!(payload.is_bot);
        assert!(payload.real_name.as_deref() == Some("ActiveUsers"));
        let user = User::from(payload);
        assert!(user.display_name == "ActiveUsers");
        assert!(user.avatar.is_empty());
    }

    #[test]
    fn presence_token_classification() {
        assert!(PresenceStatus::new("active").is_active());
        assert!(!PresenceStatus::new("away").is_active());
        assert!(!PresenceStatus::new("").is_active());
        // Anything that is not exactly "active" is inactive.
        assert!(!PresenceStatus::new("Active").is_active());
    }

    #[test]
    fn presence_token_deserializes_from_bare_string() {
        let status: PresenceStatus = serde_json::from_str(r#""active""#).unwrap();
        assert!(status.is_active());
        assert!(status.as_str() == "active");
    }
}
