use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::sync::Arc;
use tracing::debug;

use super::{
    ButtonStyle, ChannelAccess, ChannelSpec, ComponentRow, EmbedSpec, MemberInfo,
    MessageContent, PlatformClient, TranscriptLine,
};
use crate::error::Result;
use crate::interactions::ModalRequest;

/// Discord history pages are capped at 100 messages
const HISTORY_PAGE: usize = 100;

/// Serenity-backed platform client
pub struct DiscordClient {
    http: Arc<serenity::Http>,
    bot_user_id: UserId,
    guilds: DashSet<GuildId>,
}

impl DiscordClient {
    pub fn new(http: Arc<serenity::Http>, bot_user_id: UserId) -> Self {
        Self {
            http,
            bot_user_id,
            guilds: DashSet::new(),
        }
    }

    pub fn track_guild(&self, guild_id: GuildId) {
        if self.guilds.insert(guild_id) {
            debug!("Tracking guild {}", guild_id);
        }
    }

    pub fn forget_guild(&self, guild_id: GuildId) {
        self.guilds.remove(&guild_id);
    }
}

fn button_style(style: ButtonStyle) -> serenity::ButtonStyle {
    match style {
        ButtonStyle::Primary => serenity::ButtonStyle::Primary,
        ButtonStyle::Secondary => serenity::ButtonStyle::Secondary,
        ButtonStyle::Success => serenity::ButtonStyle::Success,
        ButtonStyle::Danger => serenity::ButtonStyle::Danger,
    }
}

pub fn create_embed(spec: &EmbedSpec) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(&spec.title)
        .description(&spec.description)
        .color(spec.color);
    if let Some(footer) = &spec.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
    }
    embed
}

pub fn create_components(rows: &[ComponentRow]) -> Vec<serenity::CreateActionRow> {
    rows.iter()
        .map(|row| match row {
            ComponentRow::Buttons(buttons) => serenity::CreateActionRow::Buttons(
                buttons
                    .iter()
                    .map(|b| {
                        serenity::CreateButton::new(&b.custom_id)
                            .label(&b.label)
                            .style(button_style(b.style))
                    })
                    .collect(),
            ),
            ComponentRow::Select(select) => {
                let options = select
                    .options
                    .iter()
                    .map(|o| {
                        let option = serenity::CreateSelectMenuOption::new(&o.label, &o.value);
                        match &o.description {
                            Some(description) => option.description(description),
                            None => option,
                        }
                    })
                    .collect();
                serenity::CreateActionRow::SelectMenu(
                    serenity::CreateSelectMenu::new(
                        &select.custom_id,
                        serenity::CreateSelectMenuKind::String { options },
                    )
                    .placeholder(&select.placeholder),
                )
            }
        })
        .collect()
}

pub fn create_message(content: &MessageContent) -> serenity::CreateMessage {
    let mut message = serenity::CreateMessage::new().components(create_components(&content.components));
    if let Some(text) = &content.text {
        message = message.content(text);
    }
    if let Some(embed) = &content.embed {
        message = message.embed(create_embed(embed));
    }
    message
}

pub fn edit_message(content: &MessageContent) -> serenity::EditMessage {
    let mut message = serenity::EditMessage::new().components(create_components(&content.components));
    if let Some(text) = &content.text {
        message = message.content(text);
    }
    match &content.embed {
        Some(embed) => message.embed(create_embed(embed)),
        None => message.embeds(vec![]),
    }
}

/// Body for an interaction response (new message or in-place update)
pub fn interaction_message(
    content: &MessageContent,
    ephemeral: bool,
) -> serenity::CreateInteractionResponseMessage {
    let mut message = serenity::CreateInteractionResponseMessage::new()
        .ephemeral(ephemeral)
        .components(create_components(&content.components));
    if let Some(text) = &content.text {
        message = message.content(text);
    }
    if let Some(embed) = &content.embed {
        message = message.embed(create_embed(embed));
    }
    message
}

/// Body for a poise command reply
pub fn create_reply(content: &MessageContent, ephemeral: bool) -> poise::CreateReply {
    let mut reply = poise::CreateReply::default()
        .ephemeral(ephemeral)
        .components(create_components(&content.components));
    if let Some(text) = &content.text {
        reply = reply.content(text);
    }
    if let Some(embed) = &content.embed {
        reply = reply.embed(create_embed(embed));
    }
    reply
}

/// Single-input modal
pub fn create_modal(request: &ModalRequest) -> serenity::CreateModal {
    let style = if request.long {
        serenity::InputTextStyle::Paragraph
    } else {
        serenity::InputTextStyle::Short
    };
    let mut input = serenity::CreateInputText::new(style, &request.label, &request.input_id)
        .required(request.required);
    if let Some(placeholder) = &request.placeholder {
        input = input.placeholder(placeholder);
    }
    if let Some(value) = &request.value {
        input = input.value(value);
    }
    if let Some(max_length) = request.max_length {
        input = input.max_length(max_length);
    }
    serenity::CreateModal::new(&request.custom_id, &request.title)
        .components(vec![serenity::CreateActionRow::InputText(input)])
}

fn to_utc(timestamp: &serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_default()
}

#[async_trait]
impl PlatformClient for DiscordClient {
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelId> {
        let allow = serenity::Permissions::VIEW_CHANNEL
            | serenity::Permissions::SEND_MESSAGES
            | serenity::Permissions::READ_MESSAGE_HISTORY;

        // @everyone shares the guild's ID
        let mut overwrites = vec![
            serenity::PermissionOverwrite {
                allow: serenity::Permissions::empty(),
                deny: serenity::Permissions::VIEW_CHANNEL,
                kind: serenity::PermissionOverwriteType::Role(RoleId::new(spec.guild_id.get())),
            },
            serenity::PermissionOverwrite {
                allow: allow | serenity::Permissions::MANAGE_CHANNELS,
                deny: serenity::Permissions::empty(),
                kind: serenity::PermissionOverwriteType::Member(self.bot_user_id),
            },
        ];
        overwrites.extend(spec.members.iter().map(|user_id| serenity::PermissionOverwrite {
            allow,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Member(*user_id),
        }));
        overwrites.extend(spec.roles.iter().map(|role_id| serenity::PermissionOverwrite {
            allow,
            deny: serenity::Permissions::empty(),
            kind: serenity::PermissionOverwriteType::Role(*role_id),
        }));

        let mut builder = serenity::CreateChannel::new(&spec.name)
            .kind(serenity::ChannelType::Text)
            .permissions(overwrites)
            .audit_log_reason(&spec.reason);
        if let Some(category) = spec.category {
            builder = builder.category(category);
        }

        let channel = spec
            .guild_id
            .create_channel(self.http.as_ref(), builder)
            .await?;
        Ok(channel.id)
    }

    async fn delete_channel(&self, channel_id: ChannelId, reason: &str) -> Result<()> {
        self.http.delete_channel(channel_id, Some(reason)).await?;
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, content: &MessageContent) -> Result<MessageId> {
        let message = channel_id
            .send_message(self.http.as_ref(), create_message(content))
            .await?;
        Ok(message.id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &MessageContent,
    ) -> Result<()> {
        channel_id
            .edit_message(self.http.as_ref(), message_id, edit_message(content))
            .await?;
        Ok(())
    }

    async fn send_file(
        &self,
        channel_id: ChannelId,
        text: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let message = serenity::CreateMessage::new()
            .content(text)
            .add_file(serenity::CreateAttachment::bytes(bytes, filename));
        channel_id.send_message(self.http.as_ref(), message).await?;
        Ok(())
    }

    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        Ok(())
    }

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        self.http
            .remove_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        Ok(())
    }

    async fn fetch_member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo> {
        let member = guild_id.member(self.http.as_ref(), user_id).await?;
        Ok(MemberInfo {
            user_id,
            roles: member.roles,
        })
    }

    async fn set_member_access(&self, channel_id: ChannelId, user_id: UserId, access: ChannelAccess) -> Result<()> {
        let (allow, deny) = match access {
            ChannelAccess::Full => (
                serenity::Permissions::VIEW_CHANNEL
                    | serenity::Permissions::SEND_MESSAGES
                    | serenity::Permissions::READ_MESSAGE_HISTORY,
                serenity::Permissions::empty(),
            ),
            ChannelAccess::ReadOnly => (
                serenity::Permissions::VIEW_CHANNEL | serenity::Permissions::READ_MESSAGE_HISTORY,
                serenity::Permissions::SEND_MESSAGES,
            ),
            ChannelAccess::Revoked => {
                channel_id
                    .delete_permission(
                        self.http.as_ref(),
                        serenity::PermissionOverwriteType::Member(user_id),
                    )
                    .await?;
                return Ok(());
            }
        };

        channel_id
            .create_permission(
                self.http.as_ref(),
                serenity::PermissionOverwrite {
                    allow,
                    deny,
                    kind: serenity::PermissionOverwriteType::Member(user_id),
                },
            )
            .await?;
        Ok(())
    }

    async fn fetch_transcript(&self, channel_id: ChannelId, limit: usize) -> Result<Vec<TranscriptLine>> {
        let mut collected: Vec<serenity::Message> = Vec::new();
        let mut before: Option<MessageId> = None;

        while collected.len() < limit {
            let page = (limit - collected.len()).min(HISTORY_PAGE) as u8;
            let mut request = serenity::GetMessages::new().limit(page);
            if let Some(before) = before {
                request = request.before(before);
            }
            let batch = channel_id.messages(self.http.as_ref(), request).await?;
            let Some(last) = batch.last() else {
                break;
            };
            before = Some(last.id);
            let exhausted = batch.len() < page as usize;
            collected.extend(batch);
            if exhausted {
                break;
            }
        }

        // Discord returns newest first
        Ok(collected
            .iter()
            .rev()
            .map(|m| {
                let mut content = m.content.clone();
                for attachment in &m.attachments {
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(&attachment.url);
                }
                TranscriptLine {
                    at: to_utc(&m.timestamp),
                    author: m.author.name.clone(),
                    content,
                }
            })
            .collect())
    }

    fn guilds(&self) -> Vec<GuildId> {
        self.guilds.iter().map(|g| *g).collect()
    }
}
