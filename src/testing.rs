//! Test doubles shared by unit tests.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::BotSettings;
use crate::error::{BotError, Result};
use crate::platform::{
    ChannelAccess, ChannelSpec, MemberInfo, MessageContent, PlatformClient, TranscriptLine,
};

pub const PREMIUM_ROLE: u64 = 500;
pub const SUPPORT_ROLE: u64 = 600;
pub const LOG_CHANNEL: u64 = 700;

/// Settings with every role and channel configured
pub fn test_settings() -> BotSettings {
    let mut settings = BotSettings::default();
    settings.roles.premium = Some(RoleId::new(PREMIUM_ROLE));
    settings.roles.support = Some(RoleId::new(SUPPORT_ROLE));
    settings.channels.log = Some(ChannelId::new(LOG_CHANNEL));
    settings
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateChannel {
        channel_id: ChannelId,
        name: String,
        members: Vec<UserId>,
        roles: Vec<RoleId>,
    },
    DeleteChannel {
        channel_id: ChannelId,
        reason: String,
    },
    SendMessage {
        channel_id: ChannelId,
        message_id: MessageId,
        content: MessageContent,
    },
    EditMessage {
        channel_id: ChannelId,
        message_id: MessageId,
        content: MessageContent,
    },
    SendFile {
        channel_id: ChannelId,
        text: String,
        filename: String,
        body: String,
    },
    AddRole {
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    },
    RemoveRole {
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    },
    SetMemberAccess {
        channel_id: ChannelId,
        user_id: UserId,
        access: ChannelAccess,
    },
}

/// Platform fake that records every call
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    next_id: AtomicU64,
    fail_deletes: AtomicBool,
    guilds: Mutex<Vec<GuildId>>,
    members: Mutex<HashMap<(GuildId, UserId), Vec<RoleId>>>,
    history: Mutex<HashMap<ChannelId, Vec<TranscriptLine>>>,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(10_000),
            fail_deletes: AtomicBool::new(false),
            guilds: Mutex::new(Vec::new()),
            members: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::DeleteChannel { channel_id, .. } => Some(*channel_id),
                _ => None,
            })
            .collect()
    }

    pub fn created_channels(&self) -> Vec<(ChannelId, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PlatformCall::CreateChannel { channel_id, name, .. } => Some((*channel_id, name.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn add_guild(&self, guild_id: GuildId) {
        self.guilds.lock().push(guild_id);
    }

    pub fn set_member(&self, guild_id: GuildId, user_id: UserId, roles: Vec<RoleId>) {
        self.members.lock().insert((guild_id, user_id), roles);
    }

    pub fn set_history(&self, channel_id: ChannelId, lines: Vec<(&str, &str)>) {
        let lines = lines
            .into_iter()
            .map(|(author, content)| TranscriptLine {
                at: Utc::now(),
                author: author.to_string(),
                content: content.to_string(),
            })
            .collect();
        self.history.lock().insert(channel_id, lines);
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().push(call);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for RecordingPlatform {
    async fn create_channel(&self, spec: &ChannelSpec) -> Result<ChannelId> {
        let channel_id = ChannelId::new(self.next_id());
        self.record(PlatformCall::CreateChannel {
            channel_id,
            name: spec.name.clone(),
            members: spec.members.clone(),
            roles: spec.roles.clone(),
        });
        Ok(channel_id)
    }

    async fn delete_channel(&self, channel_id: ChannelId, reason: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BotError::Discord {
                message: "Missing Access".to_string(),
            });
        }
        self.record(PlatformCall::DeleteChannel {
            channel_id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, content: &MessageContent) -> Result<MessageId> {
        let message_id = MessageId::new(self.next_id());
        self.record(PlatformCall::SendMessage {
            channel_id,
            message_id,
            content: content.clone(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &MessageContent,
    ) -> Result<()> {
        self.record(PlatformCall::EditMessage {
            channel_id,
            message_id,
            content: content.clone(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        channel_id: ChannelId,
        text: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.record(PlatformCall::SendFile {
            channel_id,
            text: text.to_string(),
            filename: filename.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
        Ok(())
    }

    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, _reason: &str) -> Result<()> {
        self.record(PlatformCall::AddRole {
            guild_id,
            user_id,
            role_id,
        });
        Ok(())
    }

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, _reason: &str) -> Result<()> {
        self.record(PlatformCall::RemoveRole {
            guild_id,
            user_id,
            role_id,
        });
        Ok(())
    }

    async fn fetch_member(&self, guild_id: GuildId, user_id: UserId) -> Result<MemberInfo> {
        let roles = self
            .members
            .lock()
            .get(&(guild_id, user_id))
            .cloned()
            .ok_or_else(|| BotError::not_found("Member"))?;
        Ok(MemberInfo { user_id, roles })
    }

    async fn set_member_access(&self, channel_id: ChannelId, user_id: UserId, access: ChannelAccess) -> Result<()> {
        self.record(PlatformCall::SetMemberAccess {
            channel_id,
            user_id,
            access,
        });
        Ok(())
    }

    async fn fetch_transcript(&self, channel_id: ChannelId, limit: usize) -> Result<Vec<TranscriptLine>> {
        let mut lines = self
            .history
            .lock()
            .get(&channel_id)
            .cloned()
            .unwrap_or_default();
        lines.truncate(limit);
        Ok(lines)
    }

    fn guilds(&self) -> Vec<GuildId> {
        self.guilds.lock().clone()
    }
}
