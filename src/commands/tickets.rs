use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::{actor, respond};
use crate::{Context, Error};

/// Post the ticket panel in this channel (Admin)
#[poise::command(slash_command, guild_only, rename = "ticket-embed", category = "Tickets")]
pub async fn ticket_embed(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.post_panel(&actor, ctx.channel_id());
    respond(ctx, result).await
}

/// Close the ticket in this channel
#[poise::command(slash_command, guild_only, rename = "ticket-close", category = "Tickets")]
pub async fn ticket_close(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.close(&actor, ctx.channel_id(), Utc::now()).await;
    respond(ctx, result).await
}

/// Reopen the closed ticket in this channel
#[poise::command(slash_command, guild_only, rename = "ticket-reopen", category = "Tickets")]
pub async fn ticket_reopen(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.reopen(&actor, ctx.channel_id()).await;
    respond(ctx, result).await
}

/// Start the delete countdown for this closed ticket (Admin)
#[poise::command(slash_command, guild_only, rename = "ticket-delete", category = "Tickets")]
pub async fn ticket_delete(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.admin_delete(&actor, ctx.channel_id()).await;
    respond(ctx, result).await
}

/// Give a member access to this ticket
#[poise::command(slash_command, guild_only, rename = "ticket-add", category = "Tickets")]
pub async fn ticket_add(
    ctx: Context<'_>,
    #[description = "Member to add"] user: serenity::User,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.add_member(&actor, ctx.channel_id(), user.id).await;
    respond(ctx, result).await
}

/// Remove a member's access to this ticket
#[poise::command(slash_command, guild_only, rename = "ticket-remove", category = "Tickets")]
pub async fn ticket_remove(
    ctx: Context<'_>,
    #[description = "Member to remove"] user: serenity::User,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().tickets.remove_member(&actor, ctx.channel_id(), user.id).await;
    respond(ctx, result).await
}
