pub mod general;
pub mod giveaway;
pub mod grants;
pub mod tickets;

pub use general::{help, ping, status};
pub use giveaway::giveaway;
pub use grants::{bot_ban, premium, premium_activate, premium_list};
pub use tickets::{ticket_add, ticket_close, ticket_delete, ticket_embed, ticket_remove, ticket_reopen};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::interactions::{Ack, Outcome};
use crate::permissions::Actor;
use crate::platform::discord::create_reply;
use crate::platform::MessageContent;
use crate::{Context, Error};

/// Command categories, also used by the command check
pub const CATEGORY_TICKETS: &str = "Tickets";
pub const CATEGORY_GIVEAWAYS: &str = "Giveaways";

/// The invoking member, with permissions when the command came from a guild
pub async fn actor(ctx: Context<'_>) -> Actor {
    match ctx.author_member().await {
        Some(member) => Actor::from_member(&member),
        None => Actor::new(ctx.author().id, ctx.guild_id()),
    }
}

async fn reply_private(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(create_reply(&MessageContent::text(text), true)).await?;
    Ok(())
}

/// Send the acknowledgment for a manager result, then run its intents
pub async fn respond(ctx: Context<'_>, result: crate::error::Result<Outcome>) -> Result<(), Error> {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_user_facing() {
                info!("'{}' rejected for {}: {}", ctx.command().qualified_name, ctx.author().name, e);
            } else {
                error!("'{}' failed: {}", ctx.command().qualified_name, e);
            }
            Outcome::from_error(&e)
        }
    };

    let reply = match &outcome.ack {
        Ack::Private(content) | Ack::Update(content) => create_reply(content, true),
        Ack::Public(content) => create_reply(content, false),
        Ack::Modal(modal) => {
            warn!("Modal '{}' can't answer a slash command", modal.custom_id);
            create_reply(&MessageContent::text("Something went wrong. Please try again later."), true)
        }
    };
    ctx.send(reply).await?;

    if !outcome.intents.is_empty() {
        let report = ctx.data().executor.run(outcome.intents).await;
        if report.failed > 0 {
            warn!(
                "'{}': {} of {} side effects failed",
                ctx.command().qualified_name,
                report.failed,
                report.failed + report.succeeded
            );
        }
    }
    Ok(())
}

/// Runs before every command: guild allow-list, feature flags, bot bans
pub async fn command_check(ctx: Context<'_>) -> Result<bool, Error> {
    let settings = &ctx.data().settings;
    if !settings.guild_allowed(ctx.guild_id()) {
        reply_private(ctx, "This bot isn't enabled in this server.").await?;
        return Ok(false);
    }

    let category = ctx.command().category.as_deref();
    if category == Some(CATEGORY_TICKETS) && !settings.features.tickets {
        reply_private(ctx, "Tickets are disabled.").await?;
        return Ok(false);
    }
    if category == Some(CATEGORY_GIVEAWAYS) && !settings.features.giveaways {
        reply_private(ctx, "Giveaways are disabled.").await?;
        return Ok(false);
    }

    if category != Some(CATEGORY_TICKETS) {
        let now = Utc::now();
        if let Some(ban) = ctx.data().grants.active_ban(ctx.author().id, now).await {
            info!("Blocked '{}' for banned user {}", ctx.command().qualified_name, ctx.author().name);
            reply_private(ctx, ctx.data().grants.ban_notice(&ban, now)).await?;
            return Ok(false);
        }
    }
    Ok(true)
}
