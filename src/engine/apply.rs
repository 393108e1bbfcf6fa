use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, UserId};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BotSettings;
use crate::engine::draw::draw_winners;
use crate::engine::rules::{
    evaluate_giveaway, evaluate_grant, evaluate_ticket, giveaway_display_intents,
    grant_expire_intents, ticket_deletable, ticket_delete_intents,
};
use crate::engine::Intent;
use crate::error::{BotError, Result};
use crate::logging::AUDIT_TARGET;
use crate::messages::mention;
use crate::models::{ExpiringGrant, Giveaway, GrantKind, Ticket};
use crate::state::SharedEntityStore;

/// Result of attempting a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<T> {
    /// This caller won the conditional write; the intents are its to issue
    Committed { entity: T, intents: Vec<Intent> },
    /// Not due, already transitioned, or missing. Nothing to do.
    Skipped,
}

impl<T> Applied<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Applied::Committed { .. })
    }

    pub fn into_intents(self) -> Vec<Intent> {
        match self {
            Applied::Committed { intents, .. } => intents,
            Applied::Skipped => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTrigger {
    /// Durable sweep; requires the delete time to have passed
    Sweep,
    /// Interactive countdown; requires the ticket to still be closed
    Countdown { requested_by: UserId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTrigger {
    /// End time reached
    Timer,
    /// Ended early by an admin; the end time is moved to now
    Forced { by: UserId },
}

/// Applies transitions through conditional writes. Shared by the sweep, the
/// countdown and manual commands so every path gets the same at-most-once
/// guarantee.
pub struct TransitionApplier {
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
    rng: Mutex<StdRng>,
}

pub type SharedTransitionApplier = Arc<TransitionApplier>;

impl TransitionApplier {
    pub fn new(store: SharedEntityStore, settings: Arc<BotSettings>) -> Self {
        Self {
            store,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic draws
    #[cfg(test)]
    pub fn with_seed(store: SharedEntityStore, settings: Arc<BotSettings>, seed: u64) -> Self {
        Self {
            store,
            settings,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn store(&self) -> &SharedEntityStore {
        &self.store
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    fn draw(&self, giveaway: &Giveaway) -> Vec<UserId> {
        let mut rng = self.rng.lock();
        draw_winners(
            &giveaway.entries,
            giveaway.winners_requested as usize,
            &mut *rng,
        )
    }

    pub async fn delete_ticket(
        &self,
        channel_id: ChannelId,
        trigger: DeleteTrigger,
        now: DateTime<Utc>,
    ) -> Applied<Ticket> {
        let updated = self
            .store
            .update_ticket_if(
                channel_id,
                |t| match trigger {
                    DeleteTrigger::Sweep => evaluate_ticket(Some(t), now).is_due(),
                    DeleteTrigger::Countdown { .. } => ticket_deletable(t),
                },
                |t| t.mark_deleted(now),
            )
            .await;

        let Some(ticket) = updated else {
            debug!("Ticket delete for {} skipped ({:?})", channel_id, trigger);
            return Applied::Skipped;
        };

        let reason = match trigger {
            DeleteTrigger::Sweep => "Ticket auto-delete after close".to_string(),
            DeleteTrigger::Countdown { requested_by } => {
                format!("Ticket deleted via countdown by {}", requested_by)
            }
        };
        info!(
            target: AUDIT_TARGET,
            "🗑️ ticket-delete: {} ({})",
            Ticket::channel_name(ticket.sequence, false),
            reason
        );
        let intents = ticket_delete_intents(&ticket, &reason);
        Applied::Committed {
            entity: ticket,
            intents,
        }
    }

    pub async fn end_giveaway(&self, id: Uuid, trigger: EndTrigger, now: DateTime<Utc>) -> Applied<Giveaway> {
        let updated = self
            .store
            .update_giveaway_if(
                id,
                |g| match trigger {
                    EndTrigger::Timer => evaluate_giveaway(Some(g), now).is_due(),
                    EndTrigger::Forced { .. } => !g.ended,
                },
                |g| {
                    if let EndTrigger::Forced { .. } = trigger {
                        g.ends_at = now;
                    }
                    let winners = self.draw(g);
                    g.finish(winners, now);
                },
            )
            .await;

        let Some(giveaway) = updated else {
            debug!("Giveaway end for {} skipped ({:?})", id, trigger);
            return Applied::Skipped;
        };

        let how = match trigger {
            EndTrigger::Timer => "timer".to_string(),
            EndTrigger::Forced { by } => format!("force-end by {}", mention(by)),
        };
        info!(
            target: AUDIT_TARGET,
            "🎉 giveaway ended ({}): \"{}\" winners={}",
            how,
            giveaway.prize,
            winner_list(&giveaway)
        );
        let intents = giveaway_display_intents(&giveaway, &self.settings);
        Applied::Committed {
            entity: giveaway,
            intents,
        }
    }

    /// Redraw winners of an ended giveaway from the same entries. Prior
    /// winners are not excluded.
    pub async fn reroll_giveaway(&self, id: Uuid, by: UserId) -> Result<Applied<Giveaway>> {
        let current = self
            .store
            .find_giveaway(id)
            .await
            .ok_or_else(|| BotError::not_found("Giveaway"))?;
        if !current.ended {
            return Err(BotError::conflict(
                "This giveaway hasn't ended yet. Use `/giveaway end <message_id>` first.",
            ));
        }

        let updated = self
            .store
            .update_giveaway_if(
                id,
                |g| g.ended,
                |g| {
                    let winners = self.draw(g);
                    g.winners = winners;
                },
            )
            .await;
        let Some(giveaway) = updated else {
            return Ok(Applied::Skipped);
        };

        info!(
            target: AUDIT_TARGET,
            "🎲 giveaway reroll by {}: \"{}\" winners={}",
            mention(by),
            giveaway.prize,
            winner_list(&giveaway)
        );
        let intents = giveaway_display_intents(&giveaway, &self.settings);
        Ok(Applied::Committed {
            entity: giveaway,
            intents,
        })
    }

    pub async fn expire_grant(&self, kind: GrantKind, subject: UserId, now: DateTime<Utc>) -> Applied<ExpiringGrant> {
        let removed = self
            .store
            .remove_grant_if(kind, subject, |g| evaluate_grant(Some(g), now).is_due())
            .await;
        let Some(grant) = removed else {
            return Applied::Skipped;
        };

        let label = match kind {
            GrantKind::Premium => "premium",
            GrantKind::Ban => "bot-ban",
        };
        info!(target: AUDIT_TARGET, "⌛ {} expired: {}", label, mention(subject));
        let intents = grant_expire_intents(&grant, &self.settings);
        Applied::Committed {
            entity: grant,
            intents,
        }
    }
}

fn winner_list(giveaway: &Giveaway) -> String {
    if giveaway.winners.is_empty() {
        return "none".to_string();
    }
    giveaway
        .winners
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, GiveawayDraft, TicketTopic};
    use crate::state::EntityStore;
    use crate::testing::test_settings;
    use chrono::Duration;
    use poise::serenity_prelude::{GuildId, MessageId};

    fn applier() -> TransitionApplier {
        TransitionApplier::with_seed(
            Arc::new(EntityStore::in_memory()),
            Arc::new(test_settings()),
            99,
        )
    }

    async fn closed_ticket(applier: &TransitionApplier, t0: DateTime<Utc>) -> ChannelId {
        let mut t = Ticket::new(
            ChannelId::new(10),
            GuildId::new(1),
            UserId::new(2),
            1,
            TicketTopic::Game,
            t0,
        );
        t.close(t0, Duration::hours(24));
        applier.store().insert_ticket(t).await.unwrap();
        ChannelId::new(10)
    }

    async fn active_giveaway(applier: &TransitionApplier, now: DateTime<Utc>) -> Uuid {
        let mut draft = GiveawayDraft::new(now);
        draft.title = "Weekly".to_string();
        draft.prize = "Nitro".to_string();
        draft.winners = 2;
        let mut gw = draft
            .into_giveaway(GuildId::new(1), ChannelId::new(2), UserId::new(3), now)
            .unwrap();
        gw.message_id = Some(MessageId::new(55));
        gw.flags.double_entry = true;
        gw.add_entry(UserId::new(1), EntryKind::Normal, false, now).unwrap();
        gw.add_entry(UserId::new(2), EntryKind::Normal, true, now).unwrap();
        gw.add_entry(UserId::new(2), EntryKind::Bonus, true, now).unwrap();
        let id = gw.id;
        applier.store().insert_giveaway(gw).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_sweep_delete_waits_for_due_time() {
        let applier = applier();
        let t0 = Utc::now();
        let channel = closed_ticket(&applier, t0).await;

        let early = applier
            .delete_ticket(channel, DeleteTrigger::Sweep, t0 + Duration::hours(1))
            .await;
        assert_eq!(early, Applied::Skipped);

        let due = applier
            .delete_ticket(channel, DeleteTrigger::Sweep, t0 + Duration::hours(24))
            .await;
        assert!(due.is_committed());
        assert_eq!(due.into_intents().len(), 1);

        let again = applier
            .delete_ticket(channel, DeleteTrigger::Sweep, t0 + Duration::hours(25))
            .await;
        assert_eq!(again, Applied::Skipped);
    }

    #[tokio::test]
    async fn test_countdown_delete_ignores_due_time() {
        let applier = applier();
        let t0 = Utc::now();
        let channel = closed_ticket(&applier, t0).await;
        let trigger = DeleteTrigger::Countdown {
            requested_by: UserId::new(2),
        };

        assert!(applier.delete_ticket(channel, trigger, t0).await.is_committed());
        assert_eq!(applier.delete_ticket(channel, trigger, t0).await, Applied::Skipped);
        let ticket = applier.store().find_ticket(channel).await.unwrap();
        assert!(ticket.is_terminal());
    }

    #[tokio::test]
    async fn test_end_giveaway_once() {
        let applier = applier();
        let now = Utc::now();
        let id = active_giveaway(&applier, now).await;
        let ends_at = applier.store().find_giveaway(id).await.unwrap().ends_at;

        assert_eq!(applier.end_giveaway(id, EndTrigger::Timer, now).await, Applied::Skipped);

        let ended = applier.end_giveaway(id, EndTrigger::Timer, ends_at).await;
        let Applied::Committed { entity, intents } = ended else {
            panic!("expected commit");
        };
        assert!(entity.ended);
        assert_eq!(entity.ends_at, ends_at);
        let mut winners = entity.winners.clone();
        winners.sort();
        assert_eq!(winners, vec![UserId::new(1), UserId::new(2)]);
        assert_eq!(intents.len(), 1);

        let forced = applier
            .end_giveaway(id, EndTrigger::Forced { by: UserId::new(3) }, ends_at)
            .await;
        assert_eq!(forced, Applied::Skipped);
    }

    #[tokio::test]
    async fn test_force_end_moves_end_time() {
        let applier = applier();
        let now = Utc::now();
        let id = active_giveaway(&applier, now).await;
        let later = now + Duration::minutes(5);

        let forced = applier
            .end_giveaway(id, EndTrigger::Forced { by: UserId::new(3) }, later)
            .await;
        let Applied::Committed { entity, .. } = forced else {
            panic!("expected commit");
        };
        assert_eq!(entity.ends_at, later);
        assert_eq!(entity.ended_at, Some(later));
    }

    #[tokio::test]
    async fn test_reroll_requires_ended() {
        let applier = applier();
        let now = Utc::now();
        let id = active_giveaway(&applier, now).await;

        let early = applier.reroll_giveaway(id, UserId::new(3)).await;
        assert!(matches!(early, Err(BotError::Conflict { .. })));
        assert!(matches!(
            applier.reroll_giveaway(Uuid::new_v4(), UserId::new(3)).await,
            Err(BotError::NotFound { .. })
        ));

        applier
            .end_giveaway(id, EndTrigger::Forced { by: UserId::new(3) }, now)
            .await;
        let before = applier.store().find_giveaway(id).await.unwrap();
        let rerolled = applier.reroll_giveaway(id, UserId::new(3)).await.unwrap();
        let Applied::Committed { entity, .. } = rerolled else {
            panic!("expected commit");
        };
        assert_eq!(entity.entries, before.entries);
        assert_eq!(entity.ends_at, before.ends_at);
        assert_eq!(entity.winners.len(), 2);
    }

    #[tokio::test]
    async fn test_expire_grant_once() {
        let applier = applier();
        let t1 = Utc::now();
        applier
            .store()
            .upsert_grant(ExpiringGrant {
                kind: GrantKind::Premium,
                subject: UserId::new(8),
                expires_at: t1,
                granted_by: UserId::new(1),
                granted_at: t1 - Duration::days(1),
                reason: None,
            })
            .await;

        let early = applier
            .expire_grant(GrantKind::Premium, UserId::new(8), t1 - Duration::seconds(1))
            .await;
        assert_eq!(early, Applied::Skipped);

        let due = applier
            .expire_grant(GrantKind::Premium, UserId::new(8), t1 + Duration::seconds(1))
            .await;
        assert_eq!(due.into_intents().len(), 1);

        let again = applier
            .expire_grant(GrantKind::Premium, UserId::new(8), t1 + Duration::seconds(2))
            .await;
        assert_eq!(again, Applied::Skipped);
    }
}
