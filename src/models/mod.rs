pub mod giveaway;
pub mod grant;
pub mod ticket;

pub use giveaway::{
    DraftField, DraftFlag, Entry, EntryKind, EntryRejection, Giveaway, GiveawayDraft,
    GiveawayFlags, MAX_WINNERS,
};
pub use grant::{grant_key, ExpiringGrant, GrantKind};
pub use ticket::{Ticket, TicketStatus, TicketTopic};
