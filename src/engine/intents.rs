use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId, UserId};
use tracing::{debug, warn};

use crate::error::Result;
use crate::messages;
use crate::platform::{ChannelAccess, MessageContent, SharedPlatform};

/// Declarative side effect, issued after the authoritative state change
/// has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    DeleteChannel {
        channel_id: ChannelId,
        reason: String,
    },
    AddRole {
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
        reason: String,
    },
    /// `guild_id: None` removes the role in every guild the bot is in
    RemoveRole {
        guild_id: Option<GuildId>,
        user_id: UserId,
        role_id: RoleId,
        reason: String,
    },
    SendMessage {
        channel_id: ChannelId,
        content: MessageContent,
    },
    EditMessage {
        channel_id: ChannelId,
        message_id: MessageId,
        content: MessageContent,
    },
    SetMemberAccess {
        channel_id: ChannelId,
        user_id: UserId,
        access: ChannelAccess,
    },
    /// Copy the channel history as a text file into the log channel
    ArchiveTranscript {
        channel_id: ChannelId,
        log_channel: ChannelId,
        header: String,
        filename: String,
        limit: usize,
    },
}

impl Intent {
    fn describe(&self) -> String {
        match self {
            Intent::DeleteChannel { channel_id, .. } => format!("delete channel {}", channel_id),
            Intent::AddRole { user_id, role_id, .. } => format!("add role {} to {}", role_id, user_id),
            Intent::RemoveRole { user_id, role_id, .. } => {
                format!("remove role {} from {}", role_id, user_id)
            }
            Intent::SendMessage { channel_id, .. } => format!("send message in {}", channel_id),
            Intent::EditMessage { message_id, .. } => format!("edit message {}", message_id),
            Intent::SetMemberAccess { channel_id, user_id, .. } => {
                format!("set access of {} on {}", user_id, channel_id)
            }
            Intent::ArchiveTranscript { channel_id, .. } => format!("archive transcript of {}", channel_id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs intents in order against the platform. Failures are logged and
/// never retried; the committed state change stands.
pub struct IntentExecutor {
    platform: SharedPlatform,
}

impl IntentExecutor {
    pub fn new(platform: SharedPlatform) -> Self {
        Self { platform }
    }

    pub async fn run(&self, intents: Vec<Intent>) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for intent in intents {
            let description = intent.describe();
            match self.run_one(intent).await {
                Ok(()) => {
                    debug!("Intent done: {}", description);
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Intent failed ({}): {}", description, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn run_one(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::DeleteChannel { channel_id, reason } => {
                self.platform.delete_channel(channel_id, &reason).await
            }
            Intent::AddRole {
                guild_id,
                user_id,
                role_id,
                reason,
            } => self.platform.add_role(guild_id, user_id, role_id, &reason).await,
            Intent::RemoveRole {
                guild_id,
                user_id,
                role_id,
                reason,
            } => {
                if let Some(guild_id) = guild_id {
                    return self.platform.remove_role(guild_id, user_id, role_id, &reason).await;
                }

                // Only guilds where the user is a member holding the role
                let mut last_error = None;
                for guild_id in self.platform.guilds() {
                    let holds_role = match self.platform.fetch_member(guild_id, user_id).await {
                        Ok(member) => member.roles.contains(&role_id),
                        Err(e) => {
                            debug!("{} not found in guild {}: {}", user_id, guild_id, e);
                            false
                        }
                    };
                    if !holds_role {
                        continue;
                    }
                    if let Err(e) = self.platform.remove_role(guild_id, user_id, role_id, &reason).await {
                        debug!("Role removal in guild {} failed: {}", guild_id, e);
                        last_error = Some(e);
                    }
                }
                match last_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            Intent::SendMessage { channel_id, content } => {
                self.platform.send_message(channel_id, &content).await.map(|_| ())
            }
            Intent::EditMessage {
                channel_id,
                message_id,
                content,
            } => self.platform.edit_message(channel_id, message_id, &content).await,
            Intent::SetMemberAccess {
                channel_id,
                user_id,
                access,
            } => self.platform.set_member_access(channel_id, user_id, access).await,
            Intent::ArchiveTranscript {
                channel_id,
                log_channel,
                header,
                filename,
                limit,
            } => {
                let lines = self.platform.fetch_transcript(channel_id, limit).await?;
                let body = messages::render_transcript(&lines);
                self.platform
                    .send_file(log_channel, &header, &filename, body.into_bytes())
                    .await
            }
        }
    }
}
