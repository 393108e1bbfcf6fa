use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::duration::parse_duration;
use crate::error::{BotError, Result};

pub const MAX_WINNERS: u32 = 25;
pub const MAX_TITLE_LEN: usize = 256;
pub const MAX_PRIZE_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Normal,
    /// Second entry available to premium members
    #[serde(alias = "star")]
    Bonus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub user_id: UserId,
    pub kind: EntryKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveawayFlags {
    /// Only premium members may enter
    pub premium_only: bool,
    /// Premium members may hold a normal and a bonus entry
    pub double_entry: bool,
    /// Show the store link on the public message
    pub store_promotion: bool,
}

/// Why an entry attempt was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRejection {
    Ended,
    PremiumOnly,
    BonusRequiresPremium,
    AlreadyEnteredKind,
    AlreadyEntered,
}

impl EntryRejection {
    pub fn message(&self) -> &'static str {
        match self {
            EntryRejection::Ended => "This giveaway has ended.",
            EntryRejection::PremiumOnly => "This giveaway is **Premium Only**.",
            EntryRejection::BonusRequiresPremium => "⭐ entries require Premium.",
            EntryRejection::AlreadyEnteredKind => "You already entered via this button.",
            EntryRejection::AlreadyEntered => "You already entered.",
        }
    }

    /// Rejections that should point the user at the premium link
    pub fn wants_premium(&self) -> bool {
        matches!(
            self,
            EntryRejection::PremiumOnly | EntryRejection::BonusRequiresPremium
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Giveaway {
    pub id: Uuid,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    /// Public message, set once it has been posted
    #[serde(default)]
    pub message_id: Option<MessageId>,
    pub created_by: UserId,
    pub title: String,
    pub description: String,
    pub prize: String,
    pub winners_requested: u32,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub ended: bool,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub winners: Vec<UserId>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub flags: GiveawayFlags,
}

impl Giveaway {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.ended && now >= self.ends_at
    }

    /// Check an entry attempt without mutating anything
    pub fn check_entry(
        &self,
        user_id: UserId,
        kind: EntryKind,
        is_premium: bool,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), EntryRejection> {
        if self.ended || now >= self.ends_at {
            return Err(EntryRejection::Ended);
        }
        if self.flags.premium_only && !is_premium {
            return Err(EntryRejection::PremiumOnly);
        }
        if kind == EntryKind::Bonus && !is_premium {
            return Err(EntryRejection::BonusRequiresPremium);
        }

        let mut held = self.entries.iter().filter(|e| e.user_id == user_id);
        if held.clone().any(|e| e.kind == kind) {
            return Err(EntryRejection::AlreadyEnteredKind);
        }
        if !self.flags.double_entry && held.next().is_some() {
            return Err(EntryRejection::AlreadyEntered);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn add_entry(
        &mut self,
        user_id: UserId,
        kind: EntryKind,
        is_premium: bool,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), EntryRejection> {
        self.check_entry(user_id, kind, is_premium, now)?;
        self.entries.push(Entry {
            user_id,
            kind,
            at: now,
        });
        Ok(())
    }

    /// active -> ended. The flag never goes back to false.
    pub fn finish(&mut self, winners: Vec<UserId>, now: DateTime<Utc>) {
        self.ended = true;
        self.ended_at = Some(now);
        self.winners = winners;
    }
}

/// Fields editable from the setup panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Description,
    Prize,
    Winners,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftFlag {
    DoubleEntry,
    PremiumOnly,
    StorePromotion,
}

/// Per-creator giveaway setup, kept in memory until created
#[derive(Debug, Clone, PartialEq)]
pub struct GiveawayDraft {
    pub title: String,
    pub description: String,
    pub prize: String,
    pub winners: u32,
    pub duration: String,
    pub flags: GiveawayFlags,
    pub started_at: DateTime<Utc>,
}

impl GiveawayDraft {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            prize: String::new(),
            winners: 1,
            duration: "1h".to_string(),
            flags: GiveawayFlags::default(),
            started_at: now,
        }
    }

    pub fn set_field(&mut self, field: DraftField, value: &str) {
        let value = value.trim();
        match field {
            DraftField::Title => self.title = truncate(value, MAX_TITLE_LEN),
            DraftField::Description => self.description = truncate(value, MAX_DESCRIPTION_LEN),
            DraftField::Prize => self.prize = truncate(value, MAX_PRIZE_LEN),
            DraftField::Winners => self.winners = value.parse().unwrap_or(1),
            DraftField::Duration => self.duration = value.to_string(),
        }
    }

    pub fn toggle(&mut self, flag: DraftFlag) {
        match flag {
            DraftFlag::DoubleEntry => self.flags.double_entry = !self.flags.double_entry,
            DraftFlag::PremiumOnly => self.flags.premium_only = !self.flags.premium_only,
            DraftFlag::StorePromotion => {
                self.flags.store_promotion = !self.flags.store_promotion
            }
        }
    }

    /// Validate and return the parsed duration
    pub fn validate(&self) -> Result<chrono::Duration> {
        let duration = parse_duration(&self.duration)
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or_else(|| BotError::validation("Invalid duration. Use like 30m / 2h / 3d."))?;
        if self.title.is_empty() || self.prize.is_empty() {
            return Err(BotError::validation("Please set at least Title and Prize."));
        }
        if self.winners < 1 || self.winners > MAX_WINNERS {
            return Err(BotError::validation("Winners must be between 1 and 25."));
        }
        Ok(duration)
    }

    /// Turn a validated draft into an active giveaway
    pub fn into_giveaway(
        self,
        guild_id: GuildId,
        channel_id: ChannelId,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Giveaway> {
        let duration = self.validate()?;
        let ends_at = now
            .checked_add_signed(duration)
            .ok_or_else(|| BotError::validation("Invalid duration. Use like 30m / 2h / 3d."))?;
        Ok(Giveaway {
            id: Uuid::new_v4(),
            guild_id,
            channel_id,
            message_id: None,
            created_by,
            title: self.title,
            description: self.description,
            prize: self.prize,
            winners_requested: self.winners,
            created_at: now,
            ends_at,
            ended: false,
            ended_at: None,
            winners: Vec::new(),
            entries: Vec::new(),
            flags: self.flags,
        })
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(flags: GiveawayFlags) -> Giveaway {
        let now = Utc::now();
        let mut draft = GiveawayDraft::new(now);
        draft.set_field(DraftField::Title, "Nitro");
        draft.set_field(DraftField::Prize, "1 month Nitro");
        draft.flags = flags;
        draft
            .into_giveaway(GuildId::new(1), ChannelId::new(2), UserId::new(3), now)
            .unwrap()
    }

    #[test]
    fn test_entry_rules_single_entry() {
        let mut gw = active(GiveawayFlags::default());
        let now = gw.created_at;
        let a = UserId::new(100);

        assert_eq!(gw.add_entry(a, EntryKind::Normal, false, now), Ok(()));
        assert_eq!(
            gw.add_entry(a, EntryKind::Normal, false, now),
            Err(EntryRejection::AlreadyEnteredKind)
        );
        assert_eq!(
            gw.add_entry(a, EntryKind::Bonus, true, now),
            Err(EntryRejection::AlreadyEntered)
        );
        assert_eq!(
            gw.add_entry(UserId::new(101), EntryKind::Bonus, false, now),
            Err(EntryRejection::BonusRequiresPremium)
        );
        assert_eq!(gw.entries.len(), 1);
    }

    #[test]
    fn test_entry_rules_double_entry() {
        let mut gw = active(GiveawayFlags {
            double_entry: true,
            ..Default::default()
        });
        let now = gw.created_at;
        let b = UserId::new(200);

        assert_eq!(gw.add_entry(b, EntryKind::Normal, true, now), Ok(()));
        assert_eq!(gw.add_entry(b, EntryKind::Bonus, true, now), Ok(()));
        assert_eq!(
            gw.add_entry(b, EntryKind::Bonus, true, now),
            Err(EntryRejection::AlreadyEnteredKind)
        );
        assert_eq!(gw.entries.len(), 2);
    }

    #[test]
    fn test_entry_rules_premium_only_and_ended() {
        let mut gw = active(GiveawayFlags {
            premium_only: true,
            ..Default::default()
        });
        let now = gw.created_at;
        assert_eq!(
            gw.check_entry(UserId::new(1), EntryKind::Normal, false, now),
            Err(EntryRejection::PremiumOnly)
        );
        assert_eq!(
            gw.check_entry(UserId::new(1), EntryKind::Normal, true, gw.ends_at),
            Err(EntryRejection::Ended)
        );

        gw.finish(vec![], now);
        assert_eq!(
            gw.check_entry(UserId::new(1), EntryKind::Normal, true, now),
            Err(EntryRejection::Ended)
        );
    }

    #[test]
    fn test_draft_defaults_and_limits() {
        let mut draft = GiveawayDraft::new(Utc::now());
        assert_eq!(draft.winners, 1);
        assert_eq!(draft.duration, "1h");

        draft.set_field(DraftField::Title, &"x".repeat(300));
        assert_eq!(draft.title.chars().count(), MAX_TITLE_LEN);
        draft.set_field(DraftField::Winners, "lots");
        assert_eq!(draft.winners, 1);

        draft.toggle(DraftFlag::PremiumOnly);
        draft.toggle(DraftFlag::PremiumOnly);
        draft.toggle(DraftFlag::DoubleEntry);
        assert!(!draft.flags.premium_only);
        assert!(draft.flags.double_entry);
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = GiveawayDraft::new(Utc::now());
        assert!(draft.validate().is_err());

        draft.set_field(DraftField::Title, "Title");
        draft.set_field(DraftField::Prize, "Prize");
        assert_eq!(draft.validate().unwrap(), chrono::Duration::hours(1));

        draft.set_field(DraftField::Winners, "26");
        assert!(matches!(draft.validate(), Err(BotError::Validation { .. })));

        draft.set_field(DraftField::Winners, "3");
        draft.set_field(DraftField::Duration, "soon");
        assert!(draft.validate().is_err());

        draft.set_field(DraftField::Duration, "0m");
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_star_alias_deserializes() {
        let kind: EntryKind = serde_json::from_str("\"star\"").unwrap();
        assert_eq!(kind, EntryKind::Bonus);
    }
}
