use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Premium,
    Ban,
}

impl GrantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::Premium => "premium",
            GrantKind::Ban => "ban",
        }
    }
}

/// Time-limited grant. At most one per (kind, subject); re-granting replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringGrant {
    pub kind: GrantKind,
    pub subject: UserId,
    pub expires_at: DateTime<Utc>,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    /// Only used by bans
    #[serde(default)]
    pub reason: Option<String>,
}

impl ExpiringGrant {
    pub fn key(&self) -> String {
        grant_key(self.kind, self.subject)
    }

    /// A grant past its expiry is void even before the sweep removes it
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at - now
    }
}

pub fn grant_key(kind: GrantKind, subject: UserId) -> String {
    format!("{}:{}", kind.as_str(), subject)
}
