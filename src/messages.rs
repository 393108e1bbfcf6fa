// src/messages.rs
use poise::serenity_prelude::{ChannelId, UserId};

use crate::config::LinkSettings;
use crate::duration::{format_duration, parse_duration};
use crate::interactions::custom_id::{
    TICKET_CANCEL_DELETE, TICKET_CLOSE, TICKET_DELETE, TICKET_OPEN, TICKET_TOPIC_SELECT,
};
use crate::interactions::ComponentAction;
use crate::models::{DraftField, DraftFlag, EntryKind, Giveaway, GiveawayDraft, Ticket};
use crate::platform::{
    ButtonSpec, ButtonStyle, ComponentRow, EmbedSpec, MessageContent, SelectOptionSpec,
    SelectSpec, TranscriptLine,
};

pub const COLOR_INFO: u32 = 0x3498db;
pub const COLOR_PANEL: u32 = 0x5865f2;
pub const COLOR_GIVEAWAY: u32 = 0xf1c40f;
pub const COLOR_ENDED: u32 = 0xe74c3c;

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "_(not set)_"
    } else {
        value
    }
}

pub fn mention(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}

// Tickets

pub fn ticket_panel() -> MessageContent {
    let embed = EmbedSpec::new(
        "Support Tickets",
        "Choose a topic, then click **Open Ticket**.\n\n\
        Topics:\n\
        • **Game**: help with a game or request\n\
        • **Premium**: premium questions\n\
        • **Glitches**: bot or site problems\n\
        • **Other**: you'll type your own topic",
        COLOR_PANEL,
    );

    let option = |label: &str, value: &str, description: &str| SelectOptionSpec {
        label: label.to_string(),
        value: value.to_string(),
        description: Some(description.to_string()),
    };

    MessageContent::embed(embed).with_components(vec![
        ComponentRow::Select(SelectSpec {
            custom_id: TICKET_TOPIC_SELECT.to_string(),
            placeholder: "Select a topic…".to_string(),
            options: vec![
                option("Game", "game", "Game help / request"),
                option("Premium", "premium", "Premium support"),
                option("Glitches", "glitches", "Report glitches"),
                option("Other", "other", "Type your own topic"),
            ],
        }),
        ComponentRow::Buttons(vec![ButtonSpec::new(
            TICKET_OPEN,
            "Open Ticket",
            ButtonStyle::Primary,
        )]),
    ])
}

pub fn ticket_greeting(opener: UserId, topic_label: &str) -> MessageContent {
    MessageContent::text(format!(
        "Hello {}! Support will be with you soon.\n\
        Topic: **{}**\n\n\
        When you're done, click **Close Ticket** below.\n\
        After closing, you can delete the ticket manually, otherwise it auto-deletes in 24h.",
        mention(opener),
        topic_label
    ))
    .with_components(vec![ComponentRow::Buttons(vec![ButtonSpec::new(
        TICKET_CLOSE,
        "Close Ticket",
        ButtonStyle::Danger,
    )])])
}

pub fn ticket_closed_prompt(closed_by: UserId) -> MessageContent {
    MessageContent::text(format!(
        "✅ Ticket closed by {}.\n\
        If you're done, you can delete this ticket now. Otherwise it is deleted automatically in 24h.",
        mention(closed_by)
    ))
    .with_components(vec![ComponentRow::Buttons(vec![ButtonSpec::new(
        TICKET_DELETE,
        "Delete Ticket",
        ButtonStyle::Danger,
    )])])
}

pub fn ticket_reopened(by: UserId) -> MessageContent {
    MessageContent::text(format!("🔓 Ticket reopened by {}.", mention(by)))
}

pub fn delete_countdown(remaining: u64) -> MessageContent {
    MessageContent::text(format!(
        "🗑️ Deleting this ticket in **{}** seconds…",
        remaining
    ))
    .with_components(vec![ComponentRow::Buttons(vec![ButtonSpec::new(
        TICKET_CANCEL_DELETE,
        "Cancel",
        ButtonStyle::Secondary,
    )])])
}

pub fn delete_cancelled(by: UserId) -> MessageContent {
    MessageContent::text(format!("❎ Deletion cancelled by {}.", mention(by)))
}

/// Final countdown frame; the Cancel button is removed
pub fn delete_now() -> MessageContent {
    MessageContent::text("🗑️ Deleting now…")
}

pub fn delete_skipped() -> MessageContent {
    MessageContent::text("Deletion skipped: this ticket is no longer closed.")
}

pub fn transcript_header(ticket: &Ticket) -> String {
    format!(
        "📄 Ticket transcript: **{}** (opener {})",
        Ticket::channel_name(ticket.sequence, false),
        mention(ticket.opener_id)
    )
}

pub fn transcript_filename(ticket: &Ticket) -> String {
    format!("{}-transcript.txt", Ticket::channel_name(ticket.sequence, false))
}

pub fn render_transcript(lines: &[TranscriptLine]) -> String {
    if lines.is_empty() {
        return "(no messages)\n".to_string();
    }
    lines
        .iter()
        .map(|line| {
            format!(
                "[{}] {}: {}\n",
                line.at.format("%Y-%m-%d %H:%M:%S"),
                line.author,
                line.content
            )
        })
        .collect()
}

// Giveaways

pub fn giveaway_setup_panel(draft: &GiveawayDraft) -> MessageContent {
    let pretty = parse_duration(&draft.duration)
        .map(|d| format!("({})", format_duration(d)))
        .unwrap_or_else(|| "(invalid)".to_string());

    let description = [
        format!("**Title:** {}", or_unset(&draft.title)),
        format!("**Description:** {}", or_unset(&draft.description)),
        format!("**Amount of winners:** {}", draft.winners),
        format!("**Prize:** {}", or_unset(&draft.prize)),
        format!("**Duration:** {} {}", draft.duration, pretty),
        format!("**Premium Benefits:** {}", on_off(draft.flags.double_entry)),
        format!("**Premium Only:** {}", on_off(draft.flags.premium_only)),
        format!("**Store Promotion:** {}", on_off(draft.flags.store_promotion)),
    ]
    .join("\n");

    let set = |field: DraftField, label: &str| {
        ButtonSpec::new(
            ComponentAction::GiveawaySet(field).custom_id(),
            label,
            ButtonStyle::Secondary,
        )
    };
    let toggle = |flag: DraftFlag, label: &str| {
        ButtonSpec::new(
            ComponentAction::GiveawayToggle(flag).custom_id(),
            label,
            ButtonStyle::Primary,
        )
    };

    MessageContent::embed(EmbedSpec::new("Giveaway Setup", description, COLOR_INFO)).with_components(vec![
        ComponentRow::Buttons(vec![
            set(DraftField::Title, "Set Title"),
            set(DraftField::Description, "Set Description"),
            set(DraftField::Prize, "Set Prize"),
            set(DraftField::Winners, "Set Winners"),
            set(DraftField::Duration, "Set Duration"),
        ]),
        ComponentRow::Buttons(vec![
            toggle(DraftFlag::DoubleEntry, "Toggle Premium Benefits"),
            toggle(DraftFlag::PremiumOnly, "Toggle Premium Only"),
            toggle(DraftFlag::StorePromotion, "Toggle Store Promotion"),
        ]),
        ComponentRow::Buttons(vec![ButtonSpec::new(
            ComponentAction::GiveawayCreate.custom_id(),
            "Create Giveaway",
            ButtonStyle::Success,
        )]),
    ])
}

/// Public message of an active giveaway
pub fn giveaway_message(giveaway: &Giveaway, links: &LinkSettings) -> MessageContent {
    let mut lines = Vec::new();
    if !giveaway.description.is_empty() {
        lines.push(giveaway.description.clone());
        lines.push(String::new());
    }
    lines.push(format!("**Prize:** {}", giveaway.prize));
    lines.push(format!("**Ends:** <t:{}:R>", giveaway.ends_at.timestamp()));
    lines.push(format!("**Entries:** {}", giveaway.entries.len()));
    lines.push(format!("**Amount of winners:** {}", giveaway.winners_requested));
    lines.push(String::new());
    lines.push(if giveaway.flags.premium_only {
        "✅ **Premium Only giveaway**".to_string()
    } else {
        "❌ **Not premium-only**".to_string()
    });
    lines.push(if giveaway.flags.double_entry {
        "✅ **Premium Benefits:** premium can enter twice (normal + ⭐)".to_string()
    } else {
        "❌ **Premium Benefits:** off".to_string()
    });
    if giveaway.flags.store_promotion {
        lines.push(format!(
            "🛒 Also available in our store: {}",
            links.store.as_deref().unwrap_or("Store link not configured")
        ));
    }

    let title = if giveaway.title.is_empty() {
        "Giveaway".to_string()
    } else {
        giveaway.title.clone()
    };

    let mut buttons = Vec::new();
    if !giveaway.flags.premium_only {
        buttons.push(ButtonSpec::new(
            ComponentAction::GiveawayEnter {
                giveaway_id: giveaway.id,
                kind: EntryKind::Normal,
            }
            .custom_id(),
            "Enter Giveaway",
            ButtonStyle::Primary,
        ));
    }
    buttons.push(ButtonSpec::new(
        ComponentAction::GiveawayEnter {
            giveaway_id: giveaway.id,
            kind: EntryKind::Bonus,
        }
        .custom_id(),
        "⭐ Enter Giveaway",
        ButtonStyle::Success,
    ));

    MessageContent::embed(EmbedSpec::new(title, lines.join("\n"), COLOR_GIVEAWAY))
        .with_components(vec![ComponentRow::Buttons(buttons)])
}

/// Public message once a giveaway has ended. Buttons are removed.
pub fn giveaway_ended_message(giveaway: &Giveaway, links: &LinkSettings) -> MessageContent {
    let winners = if giveaway.winners.is_empty() {
        "_No valid entries_".to_string()
    } else {
        giveaway
            .winners
            .iter()
            .map(|w| mention(*w))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let description = [
        format!("**Entries:** {}", giveaway.entries.len()),
        format!("**Winners:** {}", winners),
        String::new(),
        format!(
            "Create a ticket to redeem: {}",
            links.premium_info.as_deref().unwrap_or("Ticket link not configured")
        ),
    ]
    .join("\n");

    MessageContent::embed(EmbedSpec::new(
        format!("Giveaway for {} has ended", giveaway.prize),
        description,
        COLOR_ENDED,
    ))
}

pub fn giveaway_created(channel_id: ChannelId) -> MessageContent {
    MessageContent::embed(EmbedSpec::new(
        "Giveaway created",
        format!("Posted in <#{}>", channel_id),
        COLOR_GIVEAWAY,
    ))
}

pub fn giveaway_list(giveaways: &[Giveaway]) -> String {
    if giveaways.is_empty() {
        return "No active giveaways.".to_string();
    }
    giveaways
        .iter()
        .map(|g| {
            let message = g
                .message_id
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unposted".to_string());
            format!(
                "• **{}** in <#{}> (message `{}`): {} entries, ends <t:{}:R>",
                g.prize,
                g.channel_id,
                message,
                g.entries.len(),
                g.ends_at.timestamp()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn premium_link_hint(links: &LinkSettings) -> String {
    match &links.premium_info {
        Some(link) => format!(" Get Premium here: {}", link),
        None => String::new(),
    }
}
