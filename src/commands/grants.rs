use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::{actor, respond};
use crate::{Context, Error};

/// Show your remaining premium time
#[poise::command(slash_command, guild_only)]
pub async fn premium(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let outcome = ctx.data().grants.premium_status(&actor, Utc::now()).await;
    respond(ctx, Ok(outcome)).await
}

/// Grant premium for a duration (Admin)
#[poise::command(slash_command, guild_only, rename = "premium-activate")]
pub async fn premium_activate(
    ctx: Context<'_>,
    #[description = "Member to grant premium"] user: serenity::User,
    #[description = "Duration, e.g. 7d, 12h, 30m"] duration: String,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx
        .data()
        .grants
        .activate_premium(&actor, user.id, &duration, Utc::now())
        .await;
    respond(ctx, result).await
}

/// List active premium grants (Admin)
#[poise::command(slash_command, guild_only, rename = "premium-list")]
pub async fn premium_list(ctx: Context<'_>) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx.data().grants.list_premium(&actor, Utc::now()).await;
    respond(ctx, result).await
}

/// Ban a member from using the bot (Admin)
#[poise::command(slash_command, guild_only, rename = "bot-ban")]
pub async fn bot_ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] user: serenity::User,
    #[description = "Duration, e.g. 7d, 12h, 30m"] duration: String,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let actor = actor(ctx).await;
    let result = ctx
        .data()
        .grants
        .ban(&actor, user.id, &duration, reason, Utc::now())
        .await;
    respond(ctx, result).await
}
