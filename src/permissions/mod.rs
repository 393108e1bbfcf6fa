//! Who may act on what.
//!
//! Administrators may do everything. Support-role holders manage any ticket;
//! openers manage their own.

use poise::serenity_prelude::{GuildId, Member, RoleId, UserId};

use crate::config::BotSettings;
use crate::error::{BotError, Result};
use crate::models::Ticket;

/// The member behind an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub guild_id: Option<GuildId>,
    pub roles: Vec<RoleId>,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: UserId, guild_id: Option<GuildId>) -> Self {
        Self {
            user_id,
            guild_id,
            roles: Vec::new(),
            is_admin: false,
        }
    }

    /// Build from an interaction member; `permissions` is only present there
    pub fn from_member(member: &Member) -> Self {
        Self {
            user_id: member.user.id,
            guild_id: Some(member.guild_id),
            roles: member.roles.clone(),
            is_admin: member
                .permissions
                .map(|p| p.administrator())
                .unwrap_or(false),
        }
    }

    pub fn has_role(&self, role_id: Option<RoleId>) -> bool {
        role_id.is_some_and(|r| self.roles.contains(&r))
    }

    pub fn is_support(&self, settings: &BotSettings) -> bool {
        self.is_admin || self.has_role(settings.roles.support)
    }
}

pub fn can_manage_ticket(actor: &Actor, ticket: &Ticket, settings: &BotSettings) -> bool {
    actor.user_id == ticket.opener_id || actor.is_support(settings)
}

pub fn require_admin(actor: &Actor) -> Result<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(BotError::denied("Only administrators can do that."))
    }
}

pub fn require_ticket_manager(actor: &Actor, ticket: &Ticket, settings: &BotSettings) -> Result<()> {
    if can_manage_ticket(actor, ticket, settings) {
        Ok(())
    } else {
        Err(BotError::denied(
            "Only the ticket opener, support staff or an administrator can do that.",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketTopic;
    use crate::testing::{test_settings, SUPPORT_ROLE};
    use chrono::Utc;
    use poise::serenity_prelude::ChannelId;

    fn ticket() -> Ticket {
        Ticket::new(
            ChannelId::new(10),
            GuildId::new(1),
            UserId::new(2),
            1,
            TicketTopic::Game,
            Utc::now(),
        )
    }

    #[test]
    fn test_ticket_management() {
        let settings = test_settings();
        let ticket = ticket();

        let opener = Actor::new(UserId::new(2), Some(GuildId::new(1)));
        assert!(can_manage_ticket(&opener, &ticket, &settings));

        let stranger = Actor::new(UserId::new(3), Some(GuildId::new(1)));
        assert!(!can_manage_ticket(&stranger, &ticket, &settings));
        assert!(matches!(
            require_ticket_manager(&stranger, &ticket, &settings),
            Err(BotError::PermissionDenied { .. })
        ));

        let support = Actor {
            roles: vec![RoleId::new(SUPPORT_ROLE)],
            ..stranger.clone()
        };
        assert!(can_manage_ticket(&support, &ticket, &settings));
        assert!(require_admin(&support).is_err());

        let admin = Actor {
            is_admin: true,
            ..stranger
        };
        assert!(can_manage_ticket(&admin, &ticket, &settings));
        assert!(require_admin(&admin).is_ok());
    }

    #[test]
    fn test_support_role_unset() {
        let mut settings = test_settings();
        settings.roles.support = None;
        let actor = Actor {
            roles: vec![RoleId::new(SUPPORT_ROLE)],
            ..Actor::new(UserId::new(3), None)
        };
        assert!(!actor.is_support(&settings));
    }
}
