use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::BotSettings;
use crate::engine::rules::{ticket_close_intents, ticket_reopen_intents};
use crate::engine::{
    Applied, CancelOutcome, CountdownEvent, CountdownHandler, CountdownScheduler, DeleteTrigger,
    Intent, IntentExecutor, SharedTransitionApplier, StartOutcome,
};
use crate::error::{BotError, Result};
use crate::interactions::custom_id::{TICKET_OTHER_INPUT, TICKET_OTHER_MODAL};
use crate::interactions::{ModalRequest, Outcome};
use crate::logging::AUDIT_TARGET;
use crate::managers::grant_manager::SharedGrantManager;
use crate::messages;
use crate::models::{Ticket, TicketTopic};
use crate::permissions::{require_admin, require_ticket_manager, Actor};
use crate::platform::{ChannelAccess, ChannelSpec, MessageContent, SharedPlatform};
use crate::state::SharedEntityStore;

const TICKET_COUNTER: &str = "ticket";

/// Drives the countdown display and the final delete
pub struct TicketCountdownHandler {
    applier: SharedTransitionApplier,
    executor: Arc<IntentExecutor>,
    platform: SharedPlatform,
}

impl TicketCountdownHandler {
    pub fn new(applier: SharedTransitionApplier, executor: Arc<IntentExecutor>, platform: SharedPlatform) -> Self {
        Self {
            applier,
            executor,
            platform,
        }
    }

    async fn show(&self, event: &CountdownEvent, content: MessageContent) {
        let result = match event.display {
            Some(message_id) => self
                .platform
                .edit_message(event.channel_id, message_id, &content)
                .await,
            None => self
                .platform
                .send_message(event.channel_id, &content)
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            warn!("Failed to update countdown in {}: {}", event.channel_id, e);
        }
    }
}

#[async_trait]
impl CountdownHandler for TicketCountdownHandler {
    async fn on_tick(&self, event: CountdownEvent, remaining: u64) {
        if event.display.is_some() {
            self.show(&event, messages::delete_countdown(remaining)).await;
        }
    }

    async fn on_fire(&self, event: CountdownEvent) {
        let trigger = DeleteTrigger::Countdown {
            requested_by: event.requested_by,
        };
        match self
            .applier
            .delete_ticket(event.channel_id, trigger, Utc::now())
            .await
        {
            Applied::Committed { intents, .. } => {
                self.show(&event, messages::delete_now()).await;
                self.executor.run(intents).await;
            }
            Applied::Skipped => {
                info!("Countdown delete of {} skipped, ticket no longer closed", event.channel_id);
                self.show(&event, messages::delete_skipped()).await;
            }
        }
    }
}

/// Ticket lifecycle: topic choice, open, close, reopen, delete and membership
pub struct TicketManager {
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
    platform: SharedPlatform,
    grants: SharedGrantManager,
    /// Last topic each user picked from the panel
    topics: DashMap<UserId, TicketTopic>,
    countdowns: CountdownScheduler,
}

impl TicketManager {
    pub fn new(
        store: SharedEntityStore,
        settings: Arc<BotSettings>,
        platform: SharedPlatform,
        applier: SharedTransitionApplier,
        executor: Arc<IntentExecutor>,
        grants: SharedGrantManager,
    ) -> Self {
        let handler = TicketCountdownHandler::new(applier, executor, platform.clone());
        let countdowns = CountdownScheduler::new(Arc::new(handler), settings.tickets.countdown_secs);
        Self {
            store,
            settings,
            platform,
            grants,
            topics: DashMap::new(),
            countdowns,
        }
    }

    async fn ticket_in(&self, channel_id: ChannelId) -> Result<Ticket> {
        self.store
            .find_ticket(channel_id)
            .await
            .filter(|t| !t.is_terminal())
            .ok_or_else(|| BotError::validation("This doesn't look like a ticket channel."))
    }

    pub fn select_topic(&self, actor: &Actor, value: &str) -> Outcome {
        let topic = TicketTopic::from_choice(value);
        let reply = if topic.is_other() {
            "Topic selected: **Other** (you will type it when opening).".to_string()
        } else {
            format!("Topic selected: **{}**", topic.label())
        };
        self.topics.insert(actor.user_id, topic);
        Outcome::private(reply)
    }

    /// "Open Ticket" button. An "other" topic asks for the text first.
    pub async fn open_button(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Outcome> {
        let wants_text = self
            .topics
            .get(&actor.user_id)
            .map(|t| t.is_other())
            .unwrap_or(true);
        if wants_text {
            return Ok(Outcome::modal(ModalRequest {
                custom_id: TICKET_OTHER_MODAL.to_string(),
                title: "Other topic".to_string(),
                input_id: TICKET_OTHER_INPUT.to_string(),
                label: "Type your ticket topic".to_string(),
                placeholder: Some("e.g. Account issue, installation help…".to_string()),
                value: None,
                long: false,
                required: false,
                max_length: Some(100),
            }));
        }
        self.open(actor, now).await
    }

    /// Modal answer for the "other" topic; opens the ticket right away
    pub async fn submit_other_topic(&self, actor: &Actor, text: &str, now: DateTime<Utc>) -> Result<Outcome> {
        self.topics.insert(actor.user_id, TicketTopic::other(text));
        self.open(actor, now).await
    }

    pub async fn open(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Outcome> {
        let guild_id = actor
            .guild_id
            .ok_or_else(|| BotError::validation("Tickets can only be opened in a server."))?;
        let premium = self.grants.is_premium(actor, now).await;
        let topic = self
            .topics
            .get(&actor.user_id)
            .map(|t| t.value().clone())
            .unwrap_or(TicketTopic::Other(None));

        let sequence = self.store.next_sequence(TICKET_COUNTER).await;
        let name = Ticket::channel_name(sequence, premium);
        let spec = ChannelSpec {
            guild_id,
            name: name.clone(),
            category: self.settings.tickets.category,
            members: vec![actor.user_id],
            roles: self.settings.roles.support.into_iter().collect(),
            reason: format!("Ticket opened by {}", actor.user_id),
        };
        let channel_id = self.platform.create_channel(&spec).await?;

        let ticket = Ticket::new(channel_id, guild_id, actor.user_id, sequence, topic, now);
        let label = ticket.topic.label();
        self.store.insert_ticket(ticket).await?;

        info!(
            target: AUDIT_TARGET,
            "🎫 ticket-open: {} by {} topic=\"{}\"",
            name,
            messages::mention(actor.user_id),
            label
        );
        Ok(Outcome::private(format!("Ticket created: <#{}>", channel_id)).with_intents(vec![
            Intent::SendMessage {
                channel_id,
                content: messages::ticket_greeting(actor.user_id, &label),
            },
        ]))
    }

    pub async fn close(&self, actor: &Actor, channel_id: ChannelId, now: DateTime<Utc>) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        require_ticket_manager(actor, &ticket, &self.settings)?;

        let delete_after = self.settings.tickets.delete_after;
        let closed = self
            .store
            .update_ticket_if(channel_id, |t| t.is_open(), |t| t.close(now, delete_after))
            .await
            .ok_or_else(|| BotError::conflict("This ticket is already closed."))?;

        info!(
            target: AUDIT_TARGET,
            "🎫 ticket-close: {} by {}",
            Ticket::channel_name(closed.sequence, false),
            messages::mention(actor.user_id)
        );
        let intents = ticket_close_intents(&closed, actor.user_id, &self.settings);
        Ok(Outcome::private("Ticket closed.").with_intents(intents))
    }

    pub async fn reopen(&self, actor: &Actor, channel_id: ChannelId) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        require_ticket_manager(actor, &ticket, &self.settings)?;

        let reopened = self
            .store
            .update_ticket_if(channel_id, |t| t.is_closed(), |t| t.reopen())
            .await
            .ok_or_else(|| BotError::conflict("This ticket is already open."))?;

        if self.countdowns.cancel(channel_id).await == CancelOutcome::Canceled {
            info!("Reopen of {} cancelled a running delete countdown", channel_id);
        }

        info!(
            target: AUDIT_TARGET,
            "🔓 ticket-reopen: {} by {}",
            Ticket::channel_name(reopened.sequence, false),
            messages::mention(actor.user_id)
        );
        Ok(Outcome::private("Ticket reopened.")
            .with_intents(ticket_reopen_intents(&reopened, actor.user_id)))
    }

    /// "Delete Ticket" button: start the countdown on a closed ticket
    pub async fn request_delete(&self, actor: &Actor, channel_id: ChannelId) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        if !ticket.is_closed() {
            return Err(BotError::validation("Close the ticket first, then delete it."));
        }
        require_ticket_manager(actor, &ticket, &self.settings)?;

        if self.countdowns.start(channel_id, actor.user_id, None) == StartOutcome::AlreadyRunning {
            return Ok(Outcome::private("A delete countdown is already running."));
        }

        let display = messages::delete_countdown(self.countdowns.seconds());
        match self.platform.send_message(channel_id, &display).await {
            Ok(message_id) => self.countdowns.set_display(channel_id, message_id),
            Err(e) => warn!("Failed to post delete countdown in {}: {}", channel_id, e),
        }
        Ok(Outcome::private("Started delete countdown."))
    }

    /// `/ticket-delete`, administrators only
    pub async fn admin_delete(&self, actor: &Actor, channel_id: ChannelId) -> Result<Outcome> {
        require_admin(actor)?;
        self.request_delete(actor, channel_id).await
    }

    /// "Cancel" on the countdown message; the message itself is replaced
    pub async fn cancel_delete(&self, actor: &Actor, channel_id: ChannelId) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        require_ticket_manager(actor, &ticket, &self.settings)?;

        Ok(match self.countdowns.cancel(channel_id).await {
            CancelOutcome::Canceled => Outcome::update(messages::delete_cancelled(actor.user_id)),
            CancelOutcome::NotRunning => Outcome::private("No active countdown to cancel."),
            CancelOutcome::AlreadyFired => Outcome::private("Too late, this ticket is being deleted."),
        })
    }

    pub async fn add_member(&self, actor: &Actor, channel_id: ChannelId, user_id: UserId) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        require_ticket_manager(actor, &ticket, &self.settings)?;
        Ok(
            Outcome::private(format!("Added {} to this ticket.", messages::mention(user_id))).with_intents(vec![
                Intent::SetMemberAccess {
                    channel_id,
                    user_id,
                    access: ChannelAccess::Full,
                },
            ]),
        )
    }

    pub async fn remove_member(&self, actor: &Actor, channel_id: ChannelId, user_id: UserId) -> Result<Outcome> {
        let ticket = self.ticket_in(channel_id).await?;
        require_ticket_manager(actor, &ticket, &self.settings)?;
        if user_id == ticket.opener_id {
            return Err(BotError::validation("The ticket opener can't be removed."));
        }
        Ok(
            Outcome::private(format!("Removed {} from this ticket.", messages::mention(user_id))).with_intents(vec![
                Intent::SetMemberAccess {
                    channel_id,
                    user_id,
                    access: ChannelAccess::Revoked,
                },
            ]),
        )
    }

    /// `/ticket-embed`: post the panel in the current channel
    pub fn post_panel(&self, actor: &Actor, channel_id: ChannelId) -> Result<Outcome> {
        require_admin(actor)?;
        Ok(Outcome::private("Ticket panel posted.").with_intents(vec![Intent::SendMessage {
            channel_id,
            content: messages::ticket_panel(),
        }]))
    }

    pub async fn open_count(&self) -> usize {
        self.store.open_ticket_count().await
    }
}

pub type SharedTicketManager = Arc<TicketManager>;

pub fn create_shared_ticket_manager(
    store: SharedEntityStore,
    settings: Arc<BotSettings>,
    platform: SharedPlatform,
    applier: SharedTransitionApplier,
    executor: Arc<IntentExecutor>,
    grants: SharedGrantManager,
) -> SharedTicketManager {
    Arc::new(TicketManager::new(store, settings, platform, applier, executor, grants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SweepCoordinator, SweepKind, TransitionApplier};
    use crate::interactions::Ack;
    use crate::managers::grant_manager::GrantManager;
    use crate::models::TicketStatus;
    use crate::state::EntityStore;
    use crate::testing::{test_settings, PlatformCall, RecordingPlatform, PREMIUM_ROLE};
    use chrono::Duration;
    use poise::serenity_prelude::{GuildId, RoleId};
    use std::time::Duration as StdDuration;

    struct Harness {
        store: SharedEntityStore,
        platform: Arc<RecordingPlatform>,
        applier: SharedTransitionApplier,
        executor: Arc<IntentExecutor>,
        tickets: TicketManager,
    }

    fn harness() -> Harness {
        let store: SharedEntityStore = Arc::new(EntityStore::in_memory());
        let settings = Arc::new(test_settings());
        let platform = Arc::new(RecordingPlatform::new());
        let applier = Arc::new(TransitionApplier::new(store.clone(), settings.clone()));
        let executor = Arc::new(IntentExecutor::new(platform.clone()));
        let grants = Arc::new(GrantManager::new(store.clone(), settings.clone()));
        let tickets = TicketManager::new(
            store.clone(),
            settings,
            platform.clone(),
            applier.clone(),
            executor.clone(),
            grants,
        );
        Harness {
            store,
            platform,
            applier,
            executor,
            tickets,
        }
    }

    fn opener() -> Actor {
        Actor::new(UserId::new(2), Some(GuildId::new(1)))
    }

    impl Harness {
        async fn open_closed_ticket(&self) -> ChannelId {
            let now = Utc::now();
            self.tickets.select_topic(&opener(), "game");
            self.tickets.open(&opener(), now).await.unwrap();
            let (channel_id, _) = self.platform.created_channels()[0].clone();
            self.tickets.close(&opener(), channel_id, now).await.unwrap();
            channel_id
        }
    }

    #[tokio::test]
    async fn test_open_allocates_sequence_and_names() {
        let h = harness();
        let now = Utc::now();

        h.tickets.select_topic(&opener(), "game");
        let outcome = h.tickets.open(&opener(), now).await.unwrap();
        assert!(matches!(outcome.intents.as_slice(), [Intent::SendMessage { .. }]));

        let premium = Actor {
            roles: vec![RoleId::new(PREMIUM_ROLE)],
            ..Actor::new(UserId::new(3), Some(GuildId::new(1)))
        };
        h.tickets.select_topic(&premium, "glitches");
        h.tickets.open(&premium, now).await.unwrap();

        let names: Vec<String> = h.platform.created_channels().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["ticket-0001".to_string(), "⭐ticket-0002".to_string()]);

        let (channel_id, _) = h.platform.created_channels()[0].clone();
        let ticket = h.store.find_ticket(channel_id).await.unwrap();
        assert_eq!(ticket.sequence, 1);
        assert_eq!(ticket.topic, TicketTopic::Game);
        assert!(ticket.is_open());
        assert_eq!(h.tickets.open_count().await, 2);
    }

    #[tokio::test]
    async fn test_other_topic_goes_through_modal() {
        let h = harness();
        let now = Utc::now();

        let outcome = h.tickets.open_button(&opener(), now).await.unwrap();
        assert!(matches!(outcome.ack, Ack::Modal(ref m) if m.custom_id == TICKET_OTHER_MODAL));
        assert!(h.platform.created_channels().is_empty());

        h.tickets
            .submit_other_topic(&opener(), "  Account issue ", now)
            .await
            .unwrap();
        let (channel_id, _) = h.platform.created_channels()[0].clone();
        let ticket = h.store.find_ticket(channel_id).await.unwrap();
        assert_eq!(ticket.topic.label(), "Other: Account issue");
    }

    #[tokio::test]
    async fn test_close_schedules_delete_once() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;

        let ticket = h.store.find_ticket(channel_id).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Closed);
        let closed_at = ticket.closed_at.unwrap();
        assert_eq!(ticket.delete_at, Some(closed_at + Duration::hours(24)));

        let again = h.tickets.close(&opener(), channel_id, Utc::now()).await;
        assert!(matches!(again, Err(BotError::Conflict { .. })));
        assert_eq!(h.store.find_ticket(channel_id).await.unwrap(), ticket);
    }

    #[tokio::test]
    async fn test_strangers_cannot_manage() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;
        let stranger = Actor::new(UserId::new(99), Some(GuildId::new(1)));

        assert!(matches!(
            h.tickets.request_delete(&stranger, channel_id).await,
            Err(BotError::PermissionDenied { .. })
        ));
        assert!(!h.tickets.countdowns.is_running(channel_id));
        assert!(h.tickets.admin_delete(&opener(), channel_id).await.is_err());
        assert!(h
            .tickets
            .add_member(&stranger, channel_id, UserId::new(98))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_requires_closed() {
        let h = harness();
        h.tickets.select_topic(&opener(), "game");
        h.tickets.open(&opener(), Utc::now()).await.unwrap();
        let (channel_id, _) = h.platform.created_channels()[0].clone();

        let early = h.tickets.request_delete(&opener(), channel_id).await;
        assert!(matches!(early, Err(BotError::Validation { .. })));

        let unknown = h.tickets.request_delete(&opener(), ChannelId::new(1)).await;
        assert!(matches!(unknown, Err(BotError::Validation { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_deletes_once() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;

        let started = h.tickets.request_delete(&opener(), channel_id).await.unwrap();
        assert_eq!(started.text(), Some("Started delete countdown."));
        let again = h.tickets.request_delete(&opener(), channel_id).await.unwrap();
        assert_eq!(again.text(), Some("A delete countdown is already running."));

        tokio::time::sleep(StdDuration::from_secs(6)).await;

        assert_eq!(h.platform.deleted_channels(), vec![channel_id]);
        assert!(h.store.find_ticket(channel_id).await.unwrap().is_terminal());
        let edits = h
            .platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::EditMessage { .. }))
            .count();
        assert_eq!(edits, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_countdown() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;

        h.tickets.request_delete(&opener(), channel_id).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(2_500)).await;

        let cancelled = h.tickets.cancel_delete(&opener(), channel_id).await.unwrap();
        assert!(matches!(cancelled.ack, Ack::Update(_)));
        let none = h.tickets.cancel_delete(&opener(), channel_id).await.unwrap();
        assert_eq!(none.text(), Some("No active countdown to cancel."));

        tokio::time::sleep(StdDuration::from_secs(10)).await;
        assert!(h.platform.deleted_channels().is_empty());
        assert!(h.store.find_ticket(channel_id).await.unwrap().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_before_fire_skips_delete() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;
        h.tickets.request_delete(&opener(), channel_id).await.unwrap();

        // Reopened behind the countdown's back
        h.store
            .update_ticket_if(channel_id, |t| t.is_closed(), |t| t.reopen())
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_secs(6)).await;
        assert!(h.platform.deleted_channels().is_empty());
        assert!(h.store.find_ticket(channel_id).await.unwrap().is_open());
        assert!(h.platform.calls().iter().any(|c| matches!(
            c,
            PlatformCall::EditMessage { content, .. } if *content == messages::delete_skipped()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_command_cancels_countdown() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;
        h.tickets.request_delete(&opener(), channel_id).await.unwrap();

        let outcome = h.tickets.reopen(&opener(), channel_id).await.unwrap();
        assert_eq!(outcome.intents.len(), 2);
        assert!(!h.tickets.countdowns.is_running(channel_id));

        let ticket = h.store.find_ticket(channel_id).await.unwrap();
        assert!(ticket.is_open());
        assert_eq!(ticket.delete_at, None);
        assert_eq!(ticket.closed_at, None);

        tokio::time::sleep(StdDuration::from_secs(6)).await;
        assert!(h.platform.deleted_channels().is_empty());
    }

    #[tokio::test]
    async fn test_countdown_and_sweep_race_deletes_once() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;
        let due = Utc::now() + Duration::hours(25);

        let handler = TicketCountdownHandler::new(h.applier.clone(), h.executor.clone(), h.platform.clone());
        let sweep = SweepCoordinator::new(h.store.clone(), h.applier.clone(), h.executor.clone(), 25);
        let event = CountdownEvent {
            channel_id,
            requested_by: opener().user_id,
            display: None,
        };

        let (_, report) = tokio::join!(handler.on_fire(event), sweep.tick(SweepKind::Tickets, due));
        assert!(report.applied <= 1);
        assert_eq!(h.platform.deleted_channels(), vec![channel_id]);
    }

    #[tokio::test]
    async fn test_membership_intents() {
        let h = harness();
        let channel_id = h.open_closed_ticket().await;

        let added = h
            .tickets
            .add_member(&opener(), channel_id, UserId::new(50))
            .await
            .unwrap();
        assert_eq!(
            added.intents,
            vec![Intent::SetMemberAccess {
                channel_id,
                user_id: UserId::new(50),
                access: ChannelAccess::Full,
            }]
        );

        let removed = h
            .tickets
            .remove_member(&opener(), channel_id, UserId::new(50))
            .await
            .unwrap();
        assert!(matches!(
            removed.intents.as_slice(),
            [Intent::SetMemberAccess {
                access: ChannelAccess::Revoked,
                ..
            }]
        ));

        assert!(h
            .tickets
            .remove_member(&opener(), channel_id, opener().user_id)
            .await
            .is_err());
    }
}
