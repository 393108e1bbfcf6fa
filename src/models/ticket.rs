use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

/// Topic picked from the ticket panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum TicketTopic {
    Game,
    Premium,
    Glitches,
    Other(Option<String>),
}

impl TicketTopic {
    /// Map a select-menu value. Unknown values fall back to `Other`.
    pub fn from_choice(value: &str) -> Self {
        match value {
            "game" => TicketTopic::Game,
            "premium" => TicketTopic::Premium,
            "glitches" => TicketTopic::Glitches,
            _ => TicketTopic::Other(None),
        }
    }

    /// Free-text topic typed into the "other" modal
    pub fn other(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            TicketTopic::Other(None)
        } else {
            TicketTopic::Other(Some(text.to_string()))
        }
    }

    pub fn is_other(&self) -> bool {
        matches!(self, TicketTopic::Other(_))
    }

    pub fn label(&self) -> String {
        match self {
            TicketTopic::Game => "Game".to_string(),
            TicketTopic::Premium => "Premium".to_string(),
            TicketTopic::Glitches => "Glitches".to_string(),
            TicketTopic::Other(None) => "Other".to_string(),
            TicketTopic::Other(Some(text)) => format!("Other: {}", text),
        }
    }
}

/// A support ticket bound to exactly one channel.
///
/// Lifecycle: open -> closed -> deleted. A deleted ticket keeps its record
/// (status stays closed, `deleted_at` set) and is never scheduled again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub opener_id: UserId,
    pub sequence: u64,
    pub topic: TicketTopic,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Only set while closed
    #[serde(default)]
    pub delete_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn new(
        channel_id: ChannelId,
        guild_id: GuildId,
        opener_id: UserId,
        sequence: u64,
        topic: TicketTopic,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            guild_id,
            opener_id,
            sequence,
            topic,
            status: TicketStatus::Open,
            created_at: now,
            closed_at: None,
            delete_at: None,
            deleted_at: None,
        }
    }

    /// Channel name for a ticket sequence number
    pub fn channel_name(sequence: u64, premium: bool) -> String {
        if premium {
            format!("⭐ticket-{:04}", sequence)
        } else {
            format!("ticket-{:04}", sequence)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open && !self.is_terminal()
    }

    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed && !self.is_terminal()
    }

    /// open -> closed, scheduling the automatic delete
    pub fn close(&mut self, now: DateTime<Utc>, delete_after: chrono::Duration) {
        self.status = TicketStatus::Closed;
        self.closed_at = Some(now);
        self.delete_at = Some(now + delete_after);
    }

    /// closed -> open, dropping the pending delete
    pub fn reopen(&mut self) {
        self.status = TicketStatus::Open;
        self.closed_at = None;
        self.delete_at = None;
    }

    /// closed -> deleted
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.delete_at = None;
    }
}
