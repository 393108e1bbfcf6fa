use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SweepSettings;
use crate::engine::apply::{Applied, DeleteTrigger, EndTrigger, SharedTransitionApplier};
use crate::engine::intents::{Intent, IntentExecutor};
use crate::state::SharedEntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Tickets,
    Giveaways,
    Grants,
}

impl SweepKind {
    pub const ALL: [SweepKind; 3] = [SweepKind::Tickets, SweepKind::Giveaways, SweepKind::Grants];

    fn interval(&self, settings: &SweepSettings) -> StdDuration {
        match self {
            SweepKind::Tickets => settings.ticket_interval,
            SweepKind::Giveaways => settings.giveaway_interval,
            SweepKind::Grants => settings.grant_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due records found this tick
    pub examined: usize,
    /// Transitions this tick committed
    pub applied: usize,
    /// Due records someone else transitioned first
    pub skipped: usize,
    /// Side effects that failed
    pub failed_intents: usize,
}

/// Periodic, durable backstop for every time-gated transition
pub struct SweepCoordinator {
    store: SharedEntityStore,
    applier: SharedTransitionApplier,
    executor: Arc<IntentExecutor>,
    batch_size: usize,
}

impl SweepCoordinator {
    pub fn new(
        store: SharedEntityStore,
        applier: SharedTransitionApplier,
        executor: Arc<IntentExecutor>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            applier,
            executor,
            batch_size,
        }
    }

    /// One pass over a single entity kind
    pub async fn tick(&self, kind: SweepKind, now: DateTime<Utc>) -> SweepReport {
        if let Err(e) = self.store.flush().await {
            warn!("Pending state write still failing: {}", e);
        }

        let mut report = SweepReport::default();
        let mut outcomes = Vec::new();

        match kind {
            SweepKind::Tickets => {
                for ticket in self.store.due_tickets(now, self.batch_size).await {
                    outcomes.push(committed(
                        self.applier
                            .delete_ticket(ticket.channel_id, DeleteTrigger::Sweep, now)
                            .await,
                    ));
                }
            }
            SweepKind::Giveaways => {
                for giveaway in self.store.due_giveaways(now, self.batch_size).await {
                    outcomes.push(committed(
                        self.applier
                            .end_giveaway(giveaway.id, EndTrigger::Timer, now)
                            .await,
                    ));
                }
            }
            SweepKind::Grants => {
                for grant in self.store.expired_grants(now, self.batch_size).await {
                    outcomes.push(committed(
                        self.applier
                            .expire_grant(grant.kind, grant.subject, now)
                            .await,
                    ));
                }
            }
        }

        for outcome in outcomes {
            report.examined += 1;
            match outcome {
                Some(intents) => {
                    report.applied += 1;
                    report.failed_intents += self.executor.run(intents).await.failed;
                }
                None => report.skipped += 1,
            }
        }

        if report.examined > 0 {
            info!(
                "Sweep {:?}: {} due, {} applied, {} skipped, {} failed side effects",
                kind, report.examined, report.applied, report.skipped, report.failed_intents
            );
        }
        report
    }

    /// Start one interval loop per entity kind. A panicking tick is logged
    /// and the loop carries on.
    pub fn spawn(self: Arc<Self>, settings: &SweepSettings) -> Vec<JoinHandle<()>> {
        SweepKind::ALL
            .iter()
            .map(|kind| {
                let kind = *kind;
                let period = kind.interval(settings);
                let coordinator = Arc::clone(&self);
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    debug!("Sweep {:?} running every {:?}", kind, period);
                    loop {
                        interval.tick().await;
                        let tick = AssertUnwindSafe(coordinator.tick(kind, Utc::now())).catch_unwind();
                        if tick.await.is_err() {
                            error!("Sweep {:?} tick panicked", kind);
                        }
                    }
                })
            })
            .collect()
    }
}

fn committed<T>(applied: Applied<T>) -> Option<Vec<Intent>> {
    applied.is_committed().then(|| applied.into_intents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::apply::TransitionApplier;
    use crate::models::{ExpiringGrant, GrantKind, Ticket, TicketTopic};
    use crate::state::EntityStore;
    use crate::testing::{test_settings, PlatformCall, RecordingPlatform, PREMIUM_ROLE};
    use chrono::Duration;
    use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};

    struct Harness {
        store: SharedEntityStore,
        platform: Arc<RecordingPlatform>,
        sweep: SweepCoordinator,
    }

    fn harness_with(store: SharedEntityStore) -> Harness {
        let platform = Arc::new(RecordingPlatform::new());
        platform.add_guild(GuildId::new(1));
        platform.set_member(GuildId::new(1), UserId::new(9), vec![RoleId::new(PREMIUM_ROLE)]);
        let applier = Arc::new(TransitionApplier::with_seed(
            store.clone(),
            Arc::new(test_settings()),
            5,
        ));
        let executor = Arc::new(IntentExecutor::new(platform.clone()));
        Harness {
            store: store.clone(),
            platform,
            sweep: SweepCoordinator::new(store, applier, executor, 25),
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(EntityStore::in_memory()))
    }

    #[tokio::test]
    async fn test_ticket_closed_then_swept_once() {
        let h = harness();
        let t0 = Utc::now();
        let seq = h.store.next_sequence("ticket").await;
        assert_eq!(seq, 1);

        let mut ticket = Ticket::new(
            ChannelId::new(10),
            GuildId::new(1),
            UserId::new(2),
            seq,
            TicketTopic::Game,
            t0,
        );
        ticket.close(t0, Duration::hours(24));
        h.store.insert_ticket(ticket).await.unwrap();

        let first = h
            .sweep
            .tick(SweepKind::Tickets, t0 + Duration::hours(24) + Duration::seconds(1))
            .await;
        assert_eq!(first.applied, 1);
        assert_eq!(h.platform.deleted_channels(), vec![ChannelId::new(10)]);

        let stored = h.store.find_ticket(ChannelId::new(10)).await.unwrap();
        assert!(stored.is_terminal());
        assert_eq!(stored.status, crate::models::TicketStatus::Closed);

        let second = h
            .sweep
            .tick(SweepKind::Tickets, t0 + Duration::hours(24) + Duration::seconds(61))
            .await;
        assert_eq!(second, SweepReport::default());
        assert_eq!(h.platform.deleted_channels().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_is_not_requeued() {
        let h = harness();
        let t0 = Utc::now();
        let mut ticket = Ticket::new(
            ChannelId::new(10),
            GuildId::new(1),
            UserId::new(2),
            1,
            TicketTopic::Game,
            t0,
        );
        ticket.close(t0, Duration::seconds(1));
        h.store.insert_ticket(ticket).await.unwrap();
        h.platform.fail_deletes(true);

        let report = h.sweep.tick(SweepKind::Tickets, t0 + Duration::minutes(1)).await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed_intents, 1);

        let again = h.sweep.tick(SweepKind::Tickets, t0 + Duration::minutes(2)).await;
        assert_eq!(again.examined, 0);
    }

    #[tokio::test]
    async fn test_grant_expiry_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        let path = path.to_str().unwrap().to_string();
        let t1 = Utc::now();

        {
            let h = harness_with(Arc::new(EntityStore::open(&path).await.unwrap()));
            h.store
                .upsert_grant(ExpiringGrant {
                    kind: GrantKind::Premium,
                    subject: UserId::new(9),
                    expires_at: t1,
                    granted_by: UserId::new(1),
                    granted_at: t1 - Duration::days(7),
                    reason: None,
                })
                .await;

            let early = h.sweep.tick(SweepKind::Grants, t1 - Duration::seconds(1)).await;
            assert_eq!(early, SweepReport::default());
            assert!(h.platform.calls().is_empty());
        }

        // Process restarted
        let h = harness_with(Arc::new(EntityStore::open(&path).await.unwrap()));
        let due = h.sweep.tick(SweepKind::Grants, t1 + Duration::seconds(1)).await;
        assert_eq!(due.applied, 1);
        assert_eq!(
            h.platform.calls(),
            vec![PlatformCall::RemoveRole {
                guild_id: GuildId::new(1),
                user_id: UserId::new(9),
                role_id: RoleId::new(PREMIUM_ROLE),
            }]
        );

        let again = h.sweep.tick(SweepKind::Grants, t1 + Duration::seconds(2)).await;
        assert_eq!(again.applied, 0);

        // And again after another restart
        let h = harness_with(Arc::new(EntityStore::open(&path).await.unwrap()));
        let after = h.sweep.tick(SweepKind::Grants, t1 + Duration::seconds(3)).await;
        assert_eq!(after, SweepReport::default());
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_bounds_tick() {
        let store: SharedEntityStore = Arc::new(EntityStore::in_memory());
        let t0 = Utc::now();
        for i in 0..30u64 {
            store
                .upsert_grant(ExpiringGrant {
                    kind: GrantKind::Ban,
                    subject: UserId::new(100 + i),
                    expires_at: t0,
                    granted_by: UserId::new(1),
                    granted_at: t0,
                    reason: None,
                })
                .await;
        }
        let h = harness_with(store);
        let first = h.sweep.tick(SweepKind::Grants, t0 + Duration::seconds(1)).await;
        assert_eq!(first.applied, 25);
        let second = h.sweep.tick(SweepKind::Grants, t0 + Duration::seconds(2)).await;
        assert_eq!(second.applied, 5);
    }
}
