use poise::serenity_prelude as serenity;
use tracing::info;

use crate::{Data, Error};

/// Handle when the bot joins a new guild or starts up
pub async fn handle_guild_create(
    guild: &serenity::Guild,
    data: &Data,
) -> Result<(), Error> {
    info!("Processing guild: {} ({})", guild.name, guild.id);
    if !data.settings.guild_allowed(Some(guild.id)) {
        info!("Guild {} is not the allowed guild, interactions there will be refused", guild.id);
    }
    data.discord.track_guild(guild.id);
    Ok(())
}

/// The bot left or was removed; premium expiry stops touching this guild
pub async fn handle_guild_delete(
    incomplete: &serenity::UnavailableGuild,
    data: &Data,
) -> Result<(), Error> {
    if incomplete.unavailable {
        // Outage, not a removal
        return Ok(());
    }
    info!("Left guild {}", incomplete.id);
    data.discord.forget_guild(incomplete.id);
    Ok(())
}
