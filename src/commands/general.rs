use chrono::Utc;
use poise::serenity_prelude as serenity;
use tracing::info;

use super::{actor, respond};
use crate::duration::format_duration;
use crate::interactions::Outcome;
use crate::permissions::require_admin;
use crate::{Context, Error};

/// Audit lines shown by `/status`
const STATUS_AUDIT_LINES: usize = 10;

/// Check if the bot is running
#[poise::command(prefix_command, slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(poise::CreateReply::default()
        .content("🏓 Pong! Bot is working!")
        .ephemeral(true))
        .await?;
    Ok(())
}

/// Show help information
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description("Available commands:")
        .field("/ping", "Check if the bot is running", false)
        .field("/premium", "Show your remaining premium time", false)
        .field("/ticket-reopen, /ticket-add, /ticket-remove", "Manage the current ticket", false)
        .field("/ticket-embed, /ticket-delete", "Ticket panel and forced delete (Admin)", false)
        .field("/giveaway create|end|reroll|list", "Run giveaways (Admin)", false)
        .field("/premium-activate, /premium-list, /bot-ban", "Grants (Admin)", false)
        .field("/status", "Bot status and recent audit lines (Admin)", false)
        .color(0x3498db);

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

/// Uptime, counters and recent audit lines
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    if let Err(e) = require_admin(&actor) {
        return respond(ctx, Err(e)).await;
    }

    let data = ctx.data();
    let now = Utc::now();
    let grants = data.grants.counts(now).await;
    let recent: Vec<String> = data
        .log_buffer
        .get_recent(STATUS_AUDIT_LINES)
        .iter()
        .map(|entry| entry.format())
        .collect();
    let audit = if recent.is_empty() {
        "none".to_string()
    } else {
        format!("```\n{}\n```", recent.join("\n"))
    };

    let text = format!(
        "**Uptime:** {}\n**Premium active:** {}\n**Bot bans active:** {}\n**Open tickets:** {}\n**Active giveaways:** {}\n**Recent audit lines:**\n{}",
        format_duration(now - data.started_at),
        grants.premium,
        grants.bans,
        data.tickets.open_count().await,
        data.giveaways.active_count().await,
        audit
    );
    respond(ctx, Ok(Outcome::private(text))).await
}
