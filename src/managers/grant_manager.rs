use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::BotSettings;
use crate::duration::{format_duration, parse_duration};
use crate::engine::Intent;
use crate::error::{BotError, Result};
use crate::interactions::Outcome;
use crate::logging::AUDIT_TARGET;
use crate::messages::{mention, premium_link_hint};
use crate::models::{ExpiringGrant, GrantKind};
use crate::permissions::{require_admin, Actor};
use crate::state::SharedEntityStore;

/// Entries shown by `/premium-list`
pub const PREMIUM_LIST_LIMIT: usize = 40;

const DEFAULT_BAN_REASON: &str = "No reason provided";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrantCounts {
    pub premium: usize,
    pub bans: usize,
}

/// Premium and bot-ban grants
pub struct GrantManager {
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
}

impl GrantManager {
    pub fn new(store: SharedEntityStore, settings: Arc<BotSettings>) -> Self {
        Self { store, settings }
    }

    /// Premium role held, or an unexpired premium grant on record
    pub async fn is_premium(&self, actor: &Actor, now: DateTime<Utc>) -> bool {
        if actor.has_role(self.settings.roles.premium) {
            return true;
        }
        self.active_grant(GrantKind::Premium, actor.user_id, now)
            .await
            .is_some()
    }

    pub async fn active_ban(&self, user_id: UserId, now: DateTime<Utc>) -> Option<ExpiringGrant> {
        self.active_grant(GrantKind::Ban, user_id, now).await
    }

    async fn active_grant(&self, kind: GrantKind, subject: UserId, now: DateTime<Utc>) -> Option<ExpiringGrant> {
        self.store
            .find_grant(kind, subject)
            .await
            .filter(|g| g.is_active(now))
    }

    async fn upsert(
        &self,
        kind: GrantKind,
        actor: &Actor,
        subject: UserId,
        duration: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ExpiringGrant> {
        let expires_at = parse_duration(duration)
            .filter(|d| *d > chrono::Duration::zero())
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| BotError::validation("Invalid duration. Use like 7d, 12h, 30m."))?;

        let grant = ExpiringGrant {
            kind,
            subject,
            expires_at,
            granted_by: actor.user_id,
            granted_at: now,
            reason,
        };
        if let Some(previous) = self.store.upsert_grant(grant.clone()).await {
            debug!(
                "Replaced {} grant for {} (was until {})",
                kind.as_str(),
                subject,
                previous.expires_at
            );
        }
        Ok(grant)
    }

    pub async fn activate_premium(
        &self,
        actor: &Actor,
        target: UserId,
        duration: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        require_admin(actor)?;
        let grant = self
            .upsert(GrantKind::Premium, actor, target, duration, None, now)
            .await?;

        let mut intents = Vec::new();
        if let (Some(guild_id), Some(role_id)) = (actor.guild_id, self.settings.roles.premium) {
            intents.push(Intent::AddRole {
                guild_id,
                user_id: target,
                role_id,
                reason: "Premium activated".to_string(),
            });
        }

        info!(
            target: AUDIT_TARGET,
            "⭐ premium-activate: {} until {} by {}",
            mention(target),
            grant.expires_at.to_rfc3339(),
            mention(actor.user_id)
        );
        Ok(Outcome::private(format!(
            "Premium activated for {} until <t:{}:F> ({}).",
            mention(target),
            grant.expires_at.timestamp(),
            format_duration(grant.remaining(now))
        ))
        .with_intents(intents))
    }

    /// `/premium` for the caller
    pub async fn premium_status(&self, actor: &Actor, now: DateTime<Utc>) -> Outcome {
        if let Some(grant) = self.active_grant(GrantKind::Premium, actor.user_id, now).await {
            return Outcome::private(format!(
                "Premium active ✅\nTime left: **{}**",
                format_duration(grant.remaining(now))
            ));
        }
        if actor.has_role(self.settings.roles.premium) {
            return Outcome::private("Premium active ✅\nNo expiry on record.");
        }
        let link = self
            .settings
            .links
            .premium_info
            .clone()
            .unwrap_or_else(|| "Premium info link not configured.".to_string());
        Outcome::private(format!("No premium found.\n{}", link))
    }

    pub async fn list_premium(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Outcome> {
        require_admin(actor)?;
        let active = self.store.active_grants(GrantKind::Premium, now).await;
        if active.is_empty() {
            return Ok(Outcome::private("No premium users."));
        }
        let lines: Vec<String> = active
            .iter()
            .take(PREMIUM_LIST_LIMIT)
            .map(|g| format!("{}: {}", mention(g.subject), format_duration(g.remaining(now))))
            .collect();
        Ok(Outcome::private(format!("Premium users:\n{}", lines.join("\n"))))
    }

    pub async fn ban(
        &self,
        actor: &Actor,
        target: UserId,
        duration: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        require_admin(actor)?;
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_BAN_REASON.to_string());
        let grant = self
            .upsert(GrantKind::Ban, actor, target, duration, Some(reason.clone()), now)
            .await?;

        info!(
            target: AUDIT_TARGET,
            "⛔ bot-ban: {} until {} by {} ({})",
            mention(target),
            grant.expires_at.to_rfc3339(),
            mention(actor.user_id),
            reason
        );
        Ok(Outcome::private(format!(
            "Bot-banned {} until <t:{}:F>.",
            mention(target),
            grant.expires_at.timestamp()
        )))
    }

    /// Rejection shown to a banned user
    pub fn ban_notice(&self, grant: &ExpiringGrant, now: DateTime<Utc>) -> String {
        format!(
            "You are banned from using this bot for **{}**. Reason: {}",
            format_duration(grant.remaining(now)),
            grant.reason.as_deref().unwrap_or(DEFAULT_BAN_REASON)
        )
    }

    pub fn premium_hint(&self) -> String {
        premium_link_hint(&self.settings.links)
    }

    pub async fn counts(&self, now: DateTime<Utc>) -> GrantCounts {
        GrantCounts {
            premium: self.store.active_grants(GrantKind::Premium, now).await.len(),
            bans: self.store.active_grants(GrantKind::Ban, now).await.len(),
        }
    }
}

pub type SharedGrantManager = Arc<GrantManager>;

pub fn create_shared_grant_manager(store: SharedEntityStore, settings: Arc<BotSettings>) -> SharedGrantManager {
    Arc::new(GrantManager::new(store, settings))
}
