use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, GuildId};
use tracing::{debug, error, info, warn};

use crate::config::BotSettings;
use crate::engine::Intent;
use crate::error::Result;
use crate::interactions::custom_id::{GIVEAWAY_MODAL_INPUT, TICKET_OTHER_INPUT};
use crate::interactions::{Ack, ComponentAction, ModalAction, Outcome};
use crate::permissions::Actor;
use crate::platform::discord::{create_modal, interaction_message};
use crate::{Data, Error};

/// Feature an interaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Tickets,
    Giveaways,
}

fn component_area(action: &ComponentAction) -> Area {
    match action {
        ComponentAction::TicketTopic
        | ComponentAction::TicketOpen
        | ComponentAction::TicketClose
        | ComponentAction::TicketDelete
        | ComponentAction::TicketCancelDelete => Area::Tickets,
        ComponentAction::GiveawaySet(_)
        | ComponentAction::GiveawayToggle(_)
        | ComponentAction::GiveawayCreate
        | ComponentAction::GiveawayEnter { .. } => Area::Giveaways,
    }
}

fn modal_area(action: &ModalAction) -> Area {
    match action {
        ModalAction::TicketOtherTopic => Area::Tickets,
        ModalAction::GiveawayField(_) => Area::Giveaways,
    }
}

/// Guild allow-list and feature flags
pub fn gate(settings: &BotSettings, area: Area, guild_id: Option<GuildId>) -> Option<&'static str> {
    if !settings.guild_allowed(guild_id) {
        return Some("This bot isn't enabled in this server.");
    }
    match area {
        Area::Tickets if !settings.features.tickets => Some("Tickets are disabled."),
        Area::Giveaways if !settings.features.giveaways => Some("Giveaways are disabled."),
        _ => None,
    }
}

/// Rejection text if the actor may not use this interaction at all.
/// Bot bans never block ticket interactions.
async fn admission(data: &Data, area: Area, actor: &Actor, now: DateTime<Utc>) -> Option<String> {
    if let Some(text) = gate(&data.settings, area, actor.guild_id) {
        return Some(text.to_string());
    }
    if area == Area::Tickets {
        return None;
    }
    data.grants
        .active_ban(actor.user_id, now)
        .await
        .map(|ban| data.grants.ban_notice(&ban, now))
}

async fn dispatch_component(
    data: &Data,
    action: ComponentAction,
    actor: &Actor,
    channel_id: ChannelId,
    selected: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    match action {
        ComponentAction::TicketTopic => Ok(data.tickets.select_topic(actor, selected.unwrap_or_default())),
        ComponentAction::TicketOpen => data.tickets.open_button(actor, now).await,
        ComponentAction::TicketClose => data.tickets.close(actor, channel_id, now).await,
        ComponentAction::TicketDelete => data.tickets.request_delete(actor, channel_id).await,
        ComponentAction::TicketCancelDelete => data.tickets.cancel_delete(actor, channel_id).await,
        ComponentAction::GiveawaySet(field) => data.giveaways.field_modal(actor, field, now),
        ComponentAction::GiveawayToggle(flag) => data.giveaways.toggle(actor, flag, now),
        ComponentAction::GiveawayCreate => data.giveaways.create(actor, channel_id, now).await,
        ComponentAction::GiveawayEnter { giveaway_id, kind } => {
            data.giveaways.enter(actor, giveaway_id, kind, now).await
        }
    }
}

async fn dispatch_modal(
    data: &Data,
    action: ModalAction,
    actor: &Actor,
    modal: &serenity::ModalInteraction,
    now: DateTime<Utc>,
) -> Result<Outcome> {
    match action {
        ModalAction::TicketOtherTopic => {
            let text = modal_value(modal, TICKET_OTHER_INPUT);
            data.tickets.submit_other_topic(actor, &text, now).await
        }
        ModalAction::GiveawayField(field) => {
            let value = modal_value(modal, GIVEAWAY_MODAL_INPUT);
            data.giveaways.apply_field(actor, field, &value, now)
        }
    }
}

fn modal_value(modal: &serenity::ModalInteraction, input_id: &str) -> String {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            serenity::ActionRowComponent::InputText(input) if input.custom_id == input_id => {
                input.value.clone()
            }
            _ => None,
        })
        .unwrap_or_default()
}

fn actor_of(member: Option<&serenity::Member>, user: &serenity::User, guild_id: Option<GuildId>) -> Actor {
    match member {
        Some(member) => Actor::from_member(member),
        None => Actor::new(user.id, guild_id),
    }
}

fn settle(result: Result<Outcome>, custom_id: &str) -> Outcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_user_facing() {
                debug!("Interaction '{}' rejected: {}", custom_id, e);
            } else {
                error!("Interaction '{}' failed: {}", custom_id, e);
            }
            Outcome::from_error(&e)
        }
    }
}

/// A modal can't be answered with another modal
fn to_response(ack: &Ack, from_modal: bool) -> serenity::CreateInteractionResponse {
    match ack {
        Ack::Private(content) => serenity::CreateInteractionResponse::Message(interaction_message(content, true)),
        Ack::Public(content) => serenity::CreateInteractionResponse::Message(interaction_message(content, false)),
        Ack::Update(content) => {
            serenity::CreateInteractionResponse::UpdateMessage(interaction_message(content, false))
        }
        Ack::Modal(request) if !from_modal => serenity::CreateInteractionResponse::Modal(create_modal(request)),
        Ack::Modal(request) => {
            warn!("Modal '{}' requested in answer to a modal", request.custom_id);
            let outcome = Outcome::private("Something went wrong. Please try again later.");
            to_response(&outcome.ack, true)
        }
    }
}

async fn run_intents(data: &Data, intents: Vec<Intent>, custom_id: &str) {
    if intents.is_empty() {
        return;
    }
    let report = data.executor.run(intents).await;
    if report.failed > 0 {
        warn!("Interaction '{}': {} side effects failed", custom_id, report.failed);
    }
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &Data,
) -> std::result::Result<(), Error> {
    let custom_id = component.data.custom_id.as_str();
    let Some(action) = ComponentAction::parse(custom_id) else {
        debug!("Ignoring unknown component '{}'", custom_id);
        return Ok(());
    };

    let actor = actor_of(component.member.as_ref(), &component.user, component.guild_id);
    let now = Utc::now();
    let outcome = match admission(data, component_area(&action), &actor, now).await {
        Some(text) => {
            info!("Component '{}' refused for {}: {}", custom_id, component.user.name, text);
            Outcome::private(text)
        }
        None => {
            let selected = match &component.data.kind {
                serenity::ComponentInteractionDataKind::StringSelect { values } => {
                    values.first().map(String::as_str)
                }
                _ => None,
            };
            let result = dispatch_component(data, action, &actor, component.channel_id, selected, now).await;
            settle(result, custom_id)
        }
    };

    component
        .create_response(&ctx.http, to_response(&outcome.ack, false))
        .await?;
    run_intents(data, outcome.intents, custom_id).await;
    Ok(())
}

async fn handle_modal(
    ctx: &serenity::Context,
    modal: &serenity::ModalInteraction,
    data: &Data,
) -> std::result::Result<(), Error> {
    let custom_id = modal.data.custom_id.as_str();
    let Some(action) = ModalAction::parse(custom_id) else {
        debug!("Ignoring unknown modal '{}'", custom_id);
        return Ok(());
    };

    let actor = actor_of(modal.member.as_ref(), &modal.user, modal.guild_id);
    let now = Utc::now();
    let outcome = match admission(data, modal_area(&action), &actor, now).await {
        Some(text) => Outcome::private(text),
        None => settle(dispatch_modal(data, action, &actor, modal, now).await, custom_id),
    };

    modal
        .create_response(&ctx.http, to_response(&outcome.ack, true))
        .await?;
    run_intents(data, outcome.intents, custom_id).await;
    Ok(())
}

/// Buttons, selects and modal submissions. Slash commands go through poise.
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &serenity::Interaction,
    data: &Data,
) -> std::result::Result<(), Error> {
    match interaction {
        serenity::Interaction::Component(component) => handle_component(ctx, component, data).await,
        serenity::Interaction::Modal(modal) => handle_modal(ctx, modal, data).await,
        _ => Ok(()),
    }
}
