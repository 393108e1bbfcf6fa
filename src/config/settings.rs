use poise::serenity_prelude::{ChannelId, GuildId, RoleId};
use std::collections::HashMap;
use std::time::Duration as StdDuration;

use crate::error::{BotError, Result};

/// Feature switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    pub tickets: bool,
    pub giveaways: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSettings {
    /// Role that marks premium members
    pub premium: Option<RoleId>,
    /// Role allowed to manage every ticket
    pub support: Option<RoleId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Audit log channel
    pub log: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSettings {
    /// Category new ticket channels are created under
    pub category: Option<ChannelId>,
    /// Delay between closing a ticket and its automatic deletion
    pub delete_after: chrono::Duration,
    /// Length of the interactive delete countdown
    pub countdown_secs: u64,
    /// Maximum number of messages archived on close
    pub transcript_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSettings {
    pub ticket_interval: StdDuration,
    pub giveaway_interval: StdDuration,
    pub grant_interval: StdDuration,
    /// Maximum entities handled per kind per tick
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSettings {
    pub store: Option<String>,
    pub premium_info: Option<String>,
}

/// Runtime settings, read once at startup.
///
/// Values come from the process environment with an optional `settings.txt`
/// (dotenv syntax: `KEY=VALUE` per line, optional quotes, `#` comments)
/// layered on top.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub features: FeatureFlags,
    /// Only interactions from this guild are served when set
    pub allowed_guild_id: Option<GuildId>,
    pub roles: RoleSettings,
    pub channels: ChannelSettings,
    pub tickets: TicketSettings,
    pub sweep: SweepSettings,
    pub links: LinkSettings,
    /// Directory holding the durable state file
    pub state_path: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl BotSettings {
    /// Load settings from the environment overlaid with the given settings file.
    /// A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let overlay = read_overlay(path)?;
        let settings = Self::from_lookup(|key| {
            overlay
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        });
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |key: &str, default: bool| to_bool(get(key).as_deref(), default);
        let int = |key: &str, default: u64| to_int(get(key).as_deref(), default);
        let snowflake = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok()).filter(|v| *v != 0);

        let delete_after_ms = int("TICKETS_DELETE_AFTER_MS", 86_400_000);

        Self {
            features: FeatureFlags {
                tickets: flag("FEATURE_TICKETS", true),
                giveaways: flag("FEATURE_GIVEAWAYS", true),
            },
            allowed_guild_id: snowflake("ALLOWED_GUILD_ID").map(GuildId::new),
            roles: RoleSettings {
                premium: snowflake("ROLE_PREMIUM").map(RoleId::new),
                support: snowflake("ROLE_SUPPORT").map(RoleId::new),
            },
            channels: ChannelSettings {
                log: snowflake("CHANNEL_LOG").map(ChannelId::new),
            },
            tickets: TicketSettings {
                category: snowflake("TICKETS_CATEGORY").map(ChannelId::new),
                delete_after: chrono::Duration::milliseconds(
                    i64::try_from(delete_after_ms).unwrap_or(86_400_000),
                ),
                countdown_secs: int("TICKETS_COUNTDOWN_SECS", 5),
                transcript_limit: int("TICKETS_TRANSCRIPT_LIMIT", 800) as usize,
            },
            sweep: SweepSettings {
                ticket_interval: StdDuration::from_secs(int("SWEEP_TICKETS_SECS", 60)),
                giveaway_interval: StdDuration::from_secs(int("SWEEP_GIVEAWAYS_SECS", 15)),
                grant_interval: StdDuration::from_secs(int("SWEEP_GRANTS_SECS", 60)),
                batch_size: int("SWEEP_BATCH_SIZE", 25) as usize,
            },
            links: LinkSettings {
                store: get("LINK_STORE"),
                premium_info: get("LINK_PREMIUM"),
            },
            state_path: get("STATE_PATH").unwrap_or_else(|| "state".to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("SWEEP_TICKETS_SECS", self.sweep.ticket_interval),
            ("SWEEP_GIVEAWAYS_SECS", self.sweep.giveaway_interval),
            ("SWEEP_GRANTS_SECS", self.sweep.grant_interval),
        ];
        for (key, interval) in intervals {
            if interval.is_zero() {
                return Err(BotError::ConfigValidation {
                    message: format!("{} must be greater than zero", key),
                });
            }
        }
        if self.sweep.batch_size == 0 {
            return Err(BotError::ConfigValidation {
                message: "SWEEP_BATCH_SIZE must be greater than zero".to_string(),
            });
        }
        if self.tickets.countdown_secs == 0 {
            return Err(BotError::ConfigValidation {
                message: "TICKETS_COUNTDOWN_SECS must be greater than zero".to_string(),
            });
        }
        if self.tickets.delete_after <= chrono::Duration::zero() {
            return Err(BotError::ConfigValidation {
                message: "TICKETS_DELETE_AFTER_MS must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether an interaction from this guild may be served
    pub fn guild_allowed(&self, guild_id: Option<GuildId>) -> bool {
        match self.allowed_guild_id {
            Some(allowed) => guild_id == Some(allowed),
            None => true,
        }
    }
}

/// Read a dotenv-style `KEY=VALUE` file without touching the process environment
fn read_overlay(path: &str) -> Result<HashMap<String, String>> {
    let parse_error = |source| BotError::ConfigParse {
        path: path.to_string(),
        source,
    };
    let lines = match dotenv::from_path_iter(path) {
        Ok(lines) => lines,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(dotenv::Error::Io(source)) => {
            return Err(BotError::ConfigLoad {
                path: path.to_string(),
                source,
            })
        }
        Err(e) => return Err(parse_error(e)),
    };
    lines
        .collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(parse_error)
}

fn to_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "y" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "n" | "off") => false,
        _ => default,
    }
}

fn to_int(value: Option<&str>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
