//! Chat platform capability used by the engine and managers.
//!
//! The engine only speaks in the neutral types below; the serenity-backed
//! implementation lives in [`discord`].

pub mod discord;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::sync::Arc;

use crate::error::Result;

pub use discord::DiscordClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSpec {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ButtonSpec {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOptionSpec {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectSpec {
    pub custom_id: String,
    pub placeholder: String,
    pub options: Vec<SelectOptionSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRow {
    Buttons(Vec<ButtonSpec>),
    Select(SelectSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedSpec {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: Option<String>,
}

impl EmbedSpec {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            footer: None,
        }
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

/// Message body. On edits, an empty component list removes existing components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub text: Option<String>,
    pub embed: Option<EmbedSpec>,
    pub components: Vec<ComponentRow>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: EmbedSpec) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn with_components(mut self, components: Vec<ComponentRow>) -> Self {
        self.components = components;
        self
    }
}

/// Private channel to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub guild_id: GuildId,
    pub name: String,
    pub category: Option<ChannelId>,
    /// Members given access; everyone else is denied
    pub members: Vec<UserId>,
    /// Roles given access
    pub roles: Vec<RoleId>,
    pub reason: String,
}

/// Per-member access level on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAccess {
    /// View, send, read history
    Full,
    /// View and read history, no sending
    ReadOnly,
    /// Member-specific override removed
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: UserId,
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub at: DateTime<Utc>,
    pub author: String,
    pub content: String,
}

/// Outbound calls to the chat platform. Every call may fail; callers decide
/// whether a failure matters.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelId>;

    async fn delete_channel(&self, channel_id: ChannelId, reason: &str) -> Result<()>;

    async fn send_message(&self, channel_id: ChannelId, content: &MessageContent) -> Result<MessageId>;

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &MessageContent,
    ) -> Result<()>;

    async fn send_file(
        &self,
        channel_id: ChannelId,
        text: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()>;

    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()>;

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()>;

    /// Fails when the user isn't a member of the guild
    async fn fetch_member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo>;

    async fn set_member_access(&self, channel_id: ChannelId, user_id: UserId, access: ChannelAccess) -> Result<()>;

    /// Channel history, oldest first, at most `limit` messages
    async fn fetch_transcript(&self, channel_id: ChannelId, limit: usize) -> Result<Vec<TranscriptLine>>;

    /// Guilds the bot is currently in
    fn guilds(&self) -> Vec<GuildId>;
}

pub type SharedPlatform = Arc<dyn PlatformClient>;
