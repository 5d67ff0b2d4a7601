//! Session and user records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bearer credentials issued by the identity backend.
///
/// `expires_at` is absolute, in seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Build a session expiring `expires_in` seconds from now.
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self::new(
            access_token,
            refresh_token,
            chrono::Utc::now().timestamp().saturating_add(expires_in),
        )
    }

    /// True once `expires_at` is not strictly in the future.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.saturating_mul(1000) <= chrono::Utc::now().timestamp_millis()
    }

    /// Delay until the proactive refresh should fire, `lead` before expiry.
    ///
    /// `None` when that instant has already passed.
    #[must_use]
    pub fn refresh_delay(&self, lead: Duration) -> Option<Duration> {
        refresh_delay(self.expires_at, chrono::Utc::now().timestamp_millis(), lead)
    }
}

pub(crate) fn refresh_delay(expires_at: i64, now_ms: i64, lead: Duration) -> Option<Duration> {
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    let fire_at_ms = expires_at.saturating_mul(1000).saturating_sub(lead_ms);
    let delay_ms = fire_at_ms.saturating_sub(now_ms);
    (delay_ms > 0).then(|| Duration::from_millis(delay_ms as u64))
}

/// Profile extras attached to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub pinned_folder_ids: Vec<String>,
    #[serde(default)]
    pub organization_ids: Vec<String>,
}

/// The authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UserMetadata>,
}

impl User {
    /// Display name if the profile has one, otherwise the email.
    pub fn display_name(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.email)
    }
}
