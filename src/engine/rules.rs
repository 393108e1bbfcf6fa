//! Pure transition rules. No I/O: each rule looks at the current record and
//! the clock and says what, if anything, should happen.

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, UserId};
use uuid::Uuid;

use crate::config::BotSettings;
use crate::engine::Intent;
use crate::messages;
use crate::models::{ExpiringGrant, Giveaway, GrantKind, Ticket};
use crate::platform::ChannelAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NoTransition,
    TicketAutoDelete { channel_id: ChannelId },
    GiveawayAutoEnd { giveaway_id: Uuid },
    GrantExpire { kind: GrantKind, subject: UserId },
}

impl Transition {
    pub fn is_due(&self) -> bool {
        !matches!(self, Transition::NoTransition)
    }
}

/// Closed, not yet deleted, and past its delete time
pub fn evaluate_ticket(ticket: Option<&Ticket>, now: DateTime<Utc>) -> Transition {
    match ticket {
        Some(t) if t.is_closed() && t.delete_at.is_some_and(|at| now >= at) => {
            Transition::TicketAutoDelete {
                channel_id: t.channel_id,
            }
        }
        _ => Transition::NoTransition,
    }
}

/// Not ended and past its end time
pub fn evaluate_giveaway(giveaway: Option<&Giveaway>, now: DateTime<Utc>) -> Transition {
    match giveaway {
        Some(g) if g.is_due(now) => Transition::GiveawayAutoEnd { giveaway_id: g.id },
        _ => Transition::NoTransition,
    }
}

/// Past its expiry
pub fn evaluate_grant(grant: Option<&ExpiringGrant>, now: DateTime<Utc>) -> Transition {
    match grant {
        Some(g) if !g.is_active(now) => Transition::GrantExpire {
            kind: g.kind,
            subject: g.subject,
        },
        _ => Transition::NoTransition,
    }
}

/// A ticket can be deleted on request once it is closed
pub fn ticket_deletable(ticket: &Ticket) -> bool {
    ticket.is_closed()
}

pub fn ticket_delete_intents(ticket: &Ticket, reason: &str) -> Vec<Intent> {
    vec![Intent::DeleteChannel {
        channel_id: ticket.channel_id,
        reason: reason.to_string(),
    }]
}

/// Lock the opener out of writing, archive the history, post the delete prompt
pub fn ticket_close_intents(ticket: &Ticket, closed_by: UserId, settings: &BotSettings) -> Vec<Intent> {
    let mut intents = vec![Intent::SetMemberAccess {
        channel_id: ticket.channel_id,
        user_id: ticket.opener_id,
        access: ChannelAccess::ReadOnly,
    }];
    if let Some(log_channel) = settings.channels.log {
        intents.push(Intent::ArchiveTranscript {
            channel_id: ticket.channel_id,
            log_channel,
            header: messages::transcript_header(ticket),
            filename: messages::transcript_filename(ticket),
            limit: settings.tickets.transcript_limit,
        });
    }
    intents.push(Intent::SendMessage {
        channel_id: ticket.channel_id,
        content: messages::ticket_closed_prompt(closed_by),
    });
    intents
}

pub fn ticket_reopen_intents(ticket: &Ticket, reopened_by: UserId) -> Vec<Intent> {
    vec![
        Intent::SetMemberAccess {
            channel_id: ticket.channel_id,
            user_id: ticket.opener_id,
            access: ChannelAccess::Full,
        },
        Intent::SendMessage {
            channel_id: ticket.channel_id,
            content: messages::ticket_reopened(reopened_by),
        },
    ]
}

/// Refresh the public giveaway message to match the record
pub fn giveaway_display_intents(giveaway: &Giveaway, settings: &BotSettings) -> Vec<Intent> {
    let Some(message_id) = giveaway.message_id else {
        return Vec::new();
    };
    let content = if giveaway.ended {
        messages::giveaway_ended_message(giveaway, &settings.links)
    } else {
        messages::giveaway_message(giveaway, &settings.links)
    };
    vec![Intent::EditMessage {
        channel_id: giveaway.channel_id,
        message_id,
        content,
    }]
}

/// Premium loses its role everywhere; a ban needs nothing beyond the record removal
pub fn grant_expire_intents(grant: &ExpiringGrant, settings: &BotSettings) -> Vec<Intent> {
    match (grant.kind, settings.roles.premium) {
        (GrantKind::Premium, Some(role_id)) => vec![Intent::RemoveRole {
            guild_id: None,
            user_id: grant.subject,
            role_id,
            reason: "Premium expired".to_string(),
        }],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GiveawayDraft, TicketTopic};
    use crate::testing::test_settings;
    use chrono::Duration;
    use poise::serenity_prelude::{GuildId, MessageId};

    fn closed_ticket(closed_at: DateTime<Utc>) -> Ticket {
        let mut t = Ticket::new(
            ChannelId::new(10),
            GuildId::new(1),
            UserId::new(2),
            1,
            TicketTopic::Game,
            closed_at,
        );
        t.close(closed_at, Duration::hours(24));
        t
    }

    #[test]
    fn test_ticket_rule() {
        let t0 = Utc::now();
        let ticket = closed_ticket(t0);

        assert_eq!(evaluate_ticket(None, t0), Transition::NoTransition);
        assert_eq!(
            evaluate_ticket(Some(&ticket), t0 + Duration::hours(23)),
            Transition::NoTransition
        );
        assert_eq!(
            evaluate_ticket(Some(&ticket), t0 + Duration::hours(24)),
            Transition::TicketAutoDelete {
                channel_id: ChannelId::new(10)
            }
        );

        let mut reopened = ticket.clone();
        reopened.reopen();
        assert!(!evaluate_ticket(Some(&reopened), t0 + Duration::days(2)).is_due());

        let mut deleted = ticket;
        deleted.mark_deleted(t0);
        assert!(!evaluate_ticket(Some(&deleted), t0 + Duration::days(2)).is_due());
    }

    #[test]
    fn test_giveaway_rule() {
        let now = Utc::now();
        let mut draft = GiveawayDraft::new(now);
        draft.title = "t".to_string();
        draft.prize = "p".to_string();
        let mut gw = draft
            .into_giveaway(GuildId::new(1), ChannelId::new(2), UserId::new(3), now)
            .unwrap();

        assert!(!evaluate_giveaway(Some(&gw), now).is_due());
        assert_eq!(
            evaluate_giveaway(Some(&gw), gw.ends_at),
            Transition::GiveawayAutoEnd { giveaway_id: gw.id }
        );
        gw.finish(vec![], now);
        assert!(!evaluate_giveaway(Some(&gw), gw.ends_at).is_due());
        assert!(!evaluate_giveaway(None, now).is_due());
    }

    #[test]
    fn test_grant_rule_and_intents() {
        let t1 = Utc::now();
        let grant = ExpiringGrant {
            kind: GrantKind::Premium,
            subject: UserId::new(9),
            expires_at: t1,
            granted_by: UserId::new(1),
            granted_at: t1 - Duration::days(30),
            reason: None,
        };
        assert!(!evaluate_grant(Some(&grant), t1 - Duration::seconds(1)).is_due());
        assert!(evaluate_grant(Some(&grant), t1 + Duration::seconds(1)).is_due());

        let settings = test_settings();
        let intents = grant_expire_intents(&grant, &settings);
        assert_eq!(intents.len(), 1);
        assert!(matches!(intents[0], Intent::RemoveRole { guild_id: None, .. }));

        let ban = ExpiringGrant {
            kind: GrantKind::Ban,
            ..grant
        };
        assert!(grant_expire_intents(&ban, &settings).is_empty());
    }

    #[test]
    fn test_close_intents_order() {
        let ticket = closed_ticket(Utc::now());
        let intents = ticket_close_intents(&ticket, UserId::new(2), &test_settings());
        assert_eq!(intents.len(), 3);
        assert!(matches!(
            intents[0],
            Intent::SetMemberAccess {
                access: ChannelAccess::ReadOnly,
                ..
            }
        ));
        assert!(matches!(intents[1], Intent::ArchiveTranscript { .. }));
        assert!(matches!(intents[2], Intent::SendMessage { .. }));

        let mut no_log = test_settings();
        no_log.channels.log = None;
        assert_eq!(ticket_close_intents(&ticket, UserId::new(2), &no_log).len(), 2);
    }

    #[test]
    fn test_display_intents_need_message() {
        let now = Utc::now();
        let mut draft = GiveawayDraft::new(now);
        draft.title = "t".to_string();
        draft.prize = "p".to_string();
        let mut gw = draft
            .into_giveaway(GuildId::new(1), ChannelId::new(2), UserId::new(3), now)
            .unwrap();
        assert!(giveaway_display_intents(&gw, &test_settings()).is_empty());

        gw.message_id = Some(MessageId::new(44));
        let intents = giveaway_display_intents(&gw, &test_settings());
        assert!(matches!(
            intents.as_slice(),
            [Intent::EditMessage { message_id, .. }] if *message_id == MessageId::new(44)
        ));
    }
}
