use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BotSettings;
use crate::engine::rules::giveaway_display_intents;
use crate::engine::{Applied, EndTrigger, SharedTransitionApplier};
use crate::error::{BotError, Result};
use crate::interactions::custom_id::GIVEAWAY_MODAL_INPUT;
use crate::interactions::{ModalAction, ModalRequest, Outcome};
use crate::logging::AUDIT_TARGET;
use crate::managers::grant_manager::SharedGrantManager;
use crate::messages;
use crate::models::giveaway::{MAX_DESCRIPTION_LEN, MAX_PRIZE_LEN, MAX_TITLE_LEN};
use crate::models::{
    DraftField, DraftFlag, Entry, EntryKind, EntryRejection, Giveaway, GiveawayDraft,
};
use crate::permissions::{require_admin, Actor};
use crate::platform::SharedPlatform;
use crate::state::SharedEntityStore;

const SETUP_EXPIRED: &str = "Setup expired. Run `/giveaway create` again.";

fn draft_ttl() -> Duration {
    Duration::hours(1)
}

/// Parse a message ID typed into a command option
pub fn parse_message_id(value: &str) -> Result<MessageId> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(MessageId::new)
        .ok_or_else(|| BotError::validation("That doesn't look like a message ID."))
}

/// Giveaway setup drafts, entries and admin actions
pub struct GiveawayManager {
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
    platform: SharedPlatform,
    applier: SharedTransitionApplier,
    grants: SharedGrantManager,
    /// Per-creator setup, not persisted
    drafts: DashMap<UserId, GiveawayDraft>,
}

impl GiveawayManager {
    pub fn new(
        store: SharedEntityStore,
        settings: Arc<BotSettings>,
        platform: SharedPlatform,
        applier: SharedTransitionApplier,
        grants: SharedGrantManager,
    ) -> Self {
        Self {
            store,
            settings,
            platform,
            applier,
            grants,
            drafts: DashMap::new(),
        }
    }

    fn discard_stale_drafts(&self, now: DateTime<Utc>) {
        let before = self.drafts.len();
        self.drafts.retain(|_, d| now - d.started_at < draft_ttl());
        let dropped = before.saturating_sub(self.drafts.len());
        if dropped > 0 {
            debug!("Discarded {} stale giveaway drafts", dropped);
        }
    }

    fn draft(&self, user_id: UserId, now: DateTime<Utc>) -> Result<GiveawayDraft> {
        self.discard_stale_drafts(now);
        self.drafts
            .get(&user_id)
            .map(|d| d.value().clone())
            .ok_or_else(|| BotError::validation(SETUP_EXPIRED))
    }

    fn edit_draft<F>(&self, user_id: UserId, now: DateTime<Utc>, edit: F) -> Result<GiveawayDraft>
    where
        F: FnOnce(&mut GiveawayDraft),
    {
        self.discard_stale_drafts(now);
        let mut draft = self
            .drafts
            .get_mut(&user_id)
            .ok_or_else(|| BotError::validation(SETUP_EXPIRED))?;
        edit(&mut draft);
        Ok(draft.clone())
    }

    /// `/giveaway create`: fresh draft and its setup panel
    pub fn begin_setup(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Outcome> {
        require_admin(actor)?;
        self.discard_stale_drafts(now);
        let draft = GiveawayDraft::new(now);
        let panel = messages::giveaway_setup_panel(&draft);
        self.drafts.insert(actor.user_id, draft);
        Ok(Outcome::private_content(panel))
    }

    /// "Set ..." button: ask for the field value
    pub fn field_modal(&self, actor: &Actor, field: DraftField, now: DateTime<Utc>) -> Result<Outcome> {
        let draft = self.draft(actor.user_id, now)?;
        let (title, label, placeholder, current, max_length) = match field {
            DraftField::Title => ("Set Title", "Title", "My Giveaway", draft.title, MAX_TITLE_LEN),
            DraftField::Description => (
                "Set Description",
                "Description",
                "Describe the giveaway",
                draft.description,
                MAX_DESCRIPTION_LEN,
            ),
            DraftField::Prize => ("Set Prize", "Prize", "e.g. $25 Code", draft.prize, MAX_PRIZE_LEN),
            DraftField::Winners => (
                "Set Winners",
                "Amount of winners",
                "e.g. 3",
                draft.winners.to_string(),
                3,
            ),
            DraftField::Duration => ("Set Duration", "Duration", "e.g. 30m, 2h, 3d", draft.duration, 16),
        };

        Ok(Outcome::modal(ModalRequest {
            custom_id: ModalAction::GiveawayField(field).custom_id(),
            title: title.to_string(),
            input_id: GIVEAWAY_MODAL_INPUT.to_string(),
            label: label.to_string(),
            placeholder: Some(placeholder.to_string()),
            value: Some(current).filter(|v| !v.is_empty()),
            long: field == DraftField::Description,
            required: true,
            max_length: u16::try_from(max_length).ok(),
        }))
    }

    pub fn apply_field(&self, actor: &Actor, field: DraftField, value: &str, now: DateTime<Utc>) -> Result<Outcome> {
        let draft = self.edit_draft(actor.user_id, now, |d| d.set_field(field, value))?;
        Ok(Outcome::update(messages::giveaway_setup_panel(&draft)))
    }

    pub fn toggle(&self, actor: &Actor, flag: DraftFlag, now: DateTime<Utc>) -> Result<Outcome> {
        let draft = self.edit_draft(actor.user_id, now, |d| d.toggle(flag))?;
        Ok(Outcome::update(messages::giveaway_setup_panel(&draft)))
    }

    /// "Create Giveaway": validate, post the public message, persist
    pub async fn create(&self, actor: &Actor, channel_id: ChannelId, now: DateTime<Utc>) -> Result<Outcome> {
        require_admin(actor)?;
        let guild_id = actor
            .guild_id
            .ok_or_else(|| BotError::validation("Giveaways can only be created in a server."))?;
        let draft = self.draft(actor.user_id, now)?;
        let mut giveaway = draft.into_giveaway(guild_id, channel_id, actor.user_id, now)?;

        let content = messages::giveaway_message(&giveaway, &self.settings.links);
        let message_id = self.platform.send_message(channel_id, &content).await?;
        giveaway.message_id = Some(message_id);
        let giveaway = self.store.insert_giveaway(giveaway).await?;
        self.drafts.remove(&actor.user_id);

        info!(
            target: AUDIT_TARGET,
            "🎉 giveaway created: \"{}\" in <#{}> (message {}) by {}, ends {}",
            giveaway.prize,
            channel_id,
            message_id,
            messages::mention(actor.user_id),
            giveaway.ends_at.to_rfc3339()
        );
        Ok(Outcome::update(messages::giveaway_created(channel_id)))
    }

    pub async fn enter(
        &self,
        actor: &Actor,
        giveaway_id: Uuid,
        kind: EntryKind,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let premium = self.grants.is_premium(actor, now).await;
        let mut rejection: Option<EntryRejection> = None;

        let updated = self
            .store
            .update_giveaway_if(
                giveaway_id,
                |g| match g.check_entry(actor.user_id, kind, premium, now) {
                    Ok(()) => true,
                    Err(reason) => {
                        rejection = Some(reason);
                        false
                    }
                },
                |g| {
                    g.entries.push(Entry {
                        user_id: actor.user_id,
                        kind,
                        at: now,
                    })
                },
            )
            .await;

        match (updated, rejection) {
            (Some(giveaway), _) => {
                debug!("{} entered giveaway {} ({:?})", actor.user_id, giveaway.id, kind);
                Ok(Outcome::private("✅ Entered!")
                    .with_intents(giveaway_display_intents(&giveaway, &self.settings)))
            }
            (None, Some(reason)) => {
                let mut text = reason.message().to_string();
                if reason.wants_premium() {
                    text.push_str(&self.grants.premium_hint());
                }
                Ok(Outcome::private(text))
            }
            (None, None) => Err(BotError::not_found("Giveaway")),
        }
    }

    async fn by_message(&self, actor: &Actor, message_id: &str) -> Result<Giveaway> {
        let message_id = parse_message_id(message_id)?;
        self.store
            .find_giveaway_by_message(message_id)
            .await
            .filter(|g| actor.guild_id.map_or(true, |guild| g.guild_id == guild))
            .ok_or_else(|| BotError::validation("Giveaway not found for that message ID."))
    }

    /// `/giveaway end`
    pub async fn force_end(&self, actor: &Actor, message_id: &str, now: DateTime<Utc>) -> Result<Outcome> {
        require_admin(actor)?;
        let giveaway = self.by_message(actor, message_id).await?;
        match self
            .applier
            .end_giveaway(giveaway.id, EndTrigger::Forced { by: actor.user_id }, now)
            .await
        {
            Applied::Committed { intents, .. } => {
                Ok(Outcome::private("✅ Giveaway force-ended.").with_intents(intents))
            }
            Applied::Skipped => Err(BotError::conflict("This giveaway has already ended.")),
        }
    }

    /// `/giveaway reroll`
    pub async fn reroll(&self, actor: &Actor, message_id: &str) -> Result<Outcome> {
        require_admin(actor)?;
        let giveaway = self.by_message(actor, message_id).await?;
        match self.applier.reroll_giveaway(giveaway.id, actor.user_id).await? {
            Applied::Committed { intents, .. } => {
                Ok(Outcome::private("✅ Winners rerolled.").with_intents(intents))
            }
            Applied::Skipped => Err(BotError::conflict(
                "This giveaway hasn't ended yet. Use `/giveaway end <message_id>` first.",
            )),
        }
    }

    /// `/giveaway list`
    pub async fn list(&self, actor: &Actor) -> Result<Outcome> {
        require_admin(actor)?;
        let active: Vec<Giveaway> = self
            .store
            .active_giveaways()
            .await
            .into_iter()
            .filter(|g| actor.guild_id.map_or(true, |guild| g.guild_id == guild))
            .collect();
        Ok(Outcome::private(messages::giveaway_list(&active)))
    }

    pub async fn active_count(&self) -> usize {
        self.store.active_giveaways().await.len()
    }
}

pub type SharedGiveawayManager = Arc<GiveawayManager>;

pub fn create_shared_giveaway_manager(
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
    platform: SharedPlatform,
    applier: SharedTransitionApplier,
    grants: SharedGrantManager,
) -> SharedGiveawayManager {
    Arc::new(GiveawayManager::new(store, settings, platform, applier, grants))
}
