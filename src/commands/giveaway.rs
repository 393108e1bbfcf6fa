use chrono::Utc;

use super::{actor, respond};
use crate::{Context, Error};

/// Run giveaways (Admin)
#[poise::command(
    slash_command,
    guild_only,
    category = "Giveaways",
    subcommands("giveaway_create", "giveaway_end", "giveaway_reroll", "giveaway_list"),
    subcommand_required
)]
pub async fn giveaway(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Open the giveaway setup panel
#[poise::command(slash_command, guild_only, rename = "create", category = "Giveaways")]
pub async fn giveaway_create(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().giveaways.begin_setup(&actor, Utc::now());
    respond(ctx, result).await
}

/// End a giveaway now and draw its winners
#[poise::command(slash_command, guild_only, rename = "end", category = "Giveaways")]
pub async fn giveaway_end(
    ctx: Context<'_>,
    #[description = "Message ID of the giveaway"] message_id: String,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().giveaways.force_end(&actor, &message_id, Utc::now()).await;
    respond(ctx, result).await
}

/// Draw new winners for an ended giveaway
#[poise::command(slash_command, guild_only, rename = "reroll", category = "Giveaways")]
pub async fn giveaway_reroll(
    ctx: Context<'_>,
    #[description = "Message ID of the giveaway"] message_id: String,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().giveaways.reroll(&actor, &message_id).await;
    respond(ctx, result).await
}

/// List active giveaways
#[poise::command(slash_command, guild_only, rename = "list", category = "Giveaways")]
pub async fn giveaway_list(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().giveaways.list(&actor).await;
    respond(ctx, result).await
}
