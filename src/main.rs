use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord community bot: tickets, giveaways and expiring grants
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Force re-sync of slash commands to all guilds (use when commands aren't showing up)
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands per-guild instead of globally (faster for testing)
    #[arg(long)]
    guild_commands: bool,

    /// Specific guild ID to sync commands to (for testing)
    #[arg(long)]
    guild_id: Option<u64>,

    /// Settings file overlaid on the environment
    #[arg(long, default_value = "settings.txt")]
    settings: String,
}

mod commands;
mod config;
mod duration;
mod engine;
mod error;
mod events;
mod interactions;
mod logging;
mod managers;
mod messages;
mod models;
mod permissions;
mod platform;
mod state;
#[cfg(test)]
mod testing;

use commands::{
    bot_ban, giveaway, help, ping, premium, premium_activate, premium_list, status, ticket_add,
    ticket_close, ticket_delete, ticket_embed, ticket_remove, ticket_reopen,
};
use config::BotSettings;
use engine::{IntentExecutor, SweepCoordinator, TransitionApplier};
use events::{handle_guild_create, handle_guild_delete, handle_interaction};
use logging::{SharedLogBuffer, AUDIT_TARGET};
use managers::{
    create_shared_giveaway_manager, create_shared_grant_manager, create_shared_ticket_manager,
    SharedGiveawayManager, SharedGrantManager, SharedTicketManager,
};
use platform::{DiscordClient, SharedPlatform};
use state::{create_shared_entity_store, EntityStore, SharedEntityStore};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub settings: Arc<BotSettings>,
    pub discord: Arc<DiscordClient>,
    pub executor: Arc<IntentExecutor>,
    pub tickets: SharedTicketManager,
    pub giveaways: SharedGiveawayManager,
    pub grants: SharedGrantManager,
    pub log_buffer: SharedLogBuffer,
    pub started_at: DateTime<Utc>,
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Err(e) = handle_interaction(ctx, interaction, data).await {
                error!("Failed to handle interaction: {}", e);
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if let Err(e) = handle_guild_create(guild, data).await {
                error!("Failed to handle guild create: {}", e);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            if let Err(e) = handle_guild_delete(incomplete, data).await {
                error!("Failed to handle guild delete: {}", e);
            }
        }
        _ => {}
    }
    Ok(())
}

fn log_bot_id(token: &str) {
    // Discord tokens start with the base64 encoded bot ID
    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));
    if let Some(id_str) = decoded.ok().and_then(|d| String::from_utf8(d).ok()) {
        info!(
            "Bot ID: {} (configure intents at https://discord.com/developers/applications/{}/bot)",
            id_str, id_str
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Audit lines for /status and the log channel
    let log_buffer = logging::create_log_buffer(200);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let token = std::env::var("DISCORD_TOKEN").context("Missing DISCORD_TOKEN environment variable")?;
    log_bot_id(&token);

    let settings = Arc::new(BotSettings::load(&args.settings)?);
    info!(
        "Settings loaded (tickets: {}, giveaways: {}, state: {})",
        settings.features.tickets, settings.features.giveaways, settings.state_path
    );

    tokio::fs::create_dir_all(&settings.state_path)
        .await
        .with_context(|| format!("Failed to create state directory {}", settings.state_path))?;
    let state_file = format!("{}/bot_state.json", settings.state_path);
    info!("Loading state from {}...", state_file);
    let store: SharedEntityStore = create_shared_entity_store(EntityStore::open(&state_file).await?);

    let sync_commands = args.sync_commands;
    let guild_commands = args.guild_commands;
    let target_guild_id = args.guild_id;

    if sync_commands {
        info!("--sync-commands: Will force re-register slash commands");
    }
    if guild_commands {
        info!("--guild-commands: Will register commands per-guild (faster for testing)");
    } else {
        info!("Registering commands globally by default (takes up to 1 hour to propagate)");
    }
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Targeting specific guild {}", gid);
    }

    let setup_store = store.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                ping(),
                help(),
                status(),
                ticket_embed(),
                ticket_close(),
                ticket_reopen(),
                ticket_delete(),
                ticket_add(),
                ticket_remove(),
                giveaway(),
                premium(),
                premium_activate(),
                premium_list(),
                bot_ban(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            command_check: Some(|ctx| Box::pin(commands::command_check(ctx))),
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' completed for {}",
                        ctx.command().qualified_name,
                        ctx.author().name
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say("Something went wrong. Please try again later.").await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            error!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                            let _ = ctx.say(format!("Invalid arguments: {}", error)).await;
                        }
                        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
                            if let Some(error) = error {
                                error!("Command check for '{}' failed: {}", ctx.command().qualified_name, error);
                            }
                        }
                        poise::FrameworkError::MissingBotPermissions { missing_permissions, ctx, .. } => {
                            error!("Bot missing permissions for '{}': {:?}", ctx.command().qualified_name, missing_permissions);
                            let _ = ctx.say(format!("Bot is missing permissions: {:?}", missing_permissions)).await;
                        }
                        poise::FrameworkError::MissingUserPermissions { missing_permissions, ctx, .. } => {
                            error!("User {} missing permissions for '{}': {:?}", ctx.author().name, ctx.command().qualified_name, missing_permissions);
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            error!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                            let _ = ctx.say("This command only works in a server.").await;
                        }
                        other => {
                            error!("Other framework error: {}", other);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let settings = settings.clone();
            let store = setup_store.clone();
            let log_buffer = log_buffer.clone();

            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                let discord = Arc::new(DiscordClient::new(ctx.http.clone(), ready.user.id));
                for guild in &ready.guilds {
                    discord.track_guild(guild.id);
                }
                let platform: SharedPlatform = discord.clone();

                let executor = Arc::new(IntentExecutor::new(platform.clone()));
                let applier = Arc::new(TransitionApplier::new(store.clone(), settings.clone()));
                let grants = create_shared_grant_manager(store.clone(), settings.clone());
                let tickets = create_shared_ticket_manager(
                    store.clone(),
                    settings.clone(),
                    platform.clone(),
                    applier.clone(),
                    executor.clone(),
                    grants.clone(),
                );
                let giveaways = create_shared_giveaway_manager(
                    store.clone(),
                    settings.clone(),
                    platform.clone(),
                    applier.clone(),
                    grants.clone(),
                );

                let sweeps = Arc::new(SweepCoordinator::new(
                    store.clone(),
                    applier,
                    executor.clone(),
                    settings.sweep.batch_size,
                ));
                let handles = sweeps.spawn(&settings.sweep);
                info!("Started {} sweep loops", handles.len());

                match settings.channels.log {
                    Some(log_channel) => {
                        logging::spawn_audit_forwarder(log_buffer.clone(), platform.clone(), log_channel);
                    }
                    None => warn!("CHANNEL_LOG not set, audit lines stay local"),
                }

                let guilds_to_register: Vec<serenity::GuildId> = if let Some(gid) = target_guild_id {
                    vec![serenity::GuildId::new(gid)]
                } else {
                    ready.guilds.iter().map(|g| g.id).collect()
                };

                if guild_commands || sync_commands {
                    for guild_id in &guilds_to_register {
                        info!("Registering commands to guild: {}", guild_id);
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            *guild_id,
                        ).await {
                            error!("Failed to register commands for guild {}: {}", guild_id, e);
                        } else {
                            info!("Successfully registered {} commands for guild {}",
                                  framework.options().commands.len(), guild_id);
                        }
                    }
                } else {
                    info!("Registering commands globally...");
                    if let Err(e) = poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    ).await {
                        error!("Failed to register commands globally: {}", e);
                    } else {
                        info!("Successfully registered {} commands globally (may take up to 1 hour to propagate)",
                              framework.options().commands.len());
                    }
                }

                info!(target: AUDIT_TARGET, "✅ bot online as {}", ready.user.name);

                Ok(Data {
                    settings,
                    discord,
                    executor,
                    tickets,
                    giveaways,
                    grants,
                    log_buffer,
                    started_at: Utc::now(),
                })
            })
        })
        .build();

    // Transcripts read message text
    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;
    info!("Requesting privileged intents: [\"MESSAGE_CONTENT\"]");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    info!("Starting bot...");
    if let Err(e) = client.start().await {
        let err_str = e.to_string();
        if err_str.contains("Disallowed") || err_str.contains("intents") {
            error!("Failed to start bot: {}", e);
            error!("Enable MESSAGE_CONTENT under Privileged Gateway Intents in the Discord Developer Portal");
            return Err(anyhow::anyhow!(
                "Disallowed gateway intents. Enable MESSAGE_CONTENT in Discord Developer Portal"
            ));
        }
        return Err(e.into());
    }
    if let Err(e) = store.flush().await {
        error!("Final state flush failed: {}", e);
    }
    warn!("Bot ended.");

    Ok(())
}
