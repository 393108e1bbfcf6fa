//! Component and modal identifiers.
//!
//! Ticket IDs are fixed strings; giveaway IDs are `gw:` paths that carry the
//! setup field, toggle or giveaway ID they act on.

use uuid::Uuid;

use crate::models::{DraftField, DraftFlag, EntryKind};

pub const TICKET_TOPIC_SELECT: &str = "ticket-topic";
pub const TICKET_OPEN: &str = "ticket-open-btn";
pub const TICKET_CLOSE: &str = "ticket-close-btn";
pub const TICKET_DELETE: &str = "ticket-delete-btn";
pub const TICKET_CANCEL_DELETE: &str = "ticket-cancel-delete-btn";
pub const TICKET_OTHER_MODAL: &str = "ticket-other-topic-modal";
pub const TICKET_OTHER_INPUT: &str = "ticket-other-topic";
pub const GIVEAWAY_CREATE: &str = "gw:create";
/// Text input inside every giveaway setup modal
pub const GIVEAWAY_MODAL_INPUT: &str = "gw:value";

/// Button or select menu pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentAction {
    TicketTopic,
    TicketOpen,
    TicketClose,
    TicketDelete,
    TicketCancelDelete,
    GiveawaySet(DraftField),
    GiveawayToggle(DraftFlag),
    GiveawayCreate,
    GiveawayEnter { giveaway_id: Uuid, kind: EntryKind },
}

/// Modal submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    TicketOtherTopic,
    GiveawayField(DraftField),
}

fn field_token(field: DraftField) -> &'static str {
    match field {
        DraftField::Title => "title",
        DraftField::Description => "desc",
        DraftField::Prize => "prize",
        DraftField::Winners => "winners",
        DraftField::Duration => "duration",
    }
}

fn parse_field(token: &str) -> Option<DraftField> {
    match token {
        "title" => Some(DraftField::Title),
        "desc" => Some(DraftField::Description),
        "prize" => Some(DraftField::Prize),
        "winners" => Some(DraftField::Winners),
        "duration" => Some(DraftField::Duration),
        _ => None,
    }
}

fn flag_token(flag: DraftFlag) -> &'static str {
    match flag {
        DraftFlag::DoubleEntry => "pb",
        DraftFlag::PremiumOnly => "po",
        DraftFlag::StorePromotion => "sp",
    }
}

fn parse_flag(token: &str) -> Option<DraftFlag> {
    match token {
        "pb" => Some(DraftFlag::DoubleEntry),
        "po" => Some(DraftFlag::PremiumOnly),
        "sp" => Some(DraftFlag::StorePromotion),
        _ => None,
    }
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        match custom_id {
            TICKET_TOPIC_SELECT => return Some(Self::TicketTopic),
            TICKET_OPEN => return Some(Self::TicketOpen),
            TICKET_CLOSE => return Some(Self::TicketClose),
            TICKET_DELETE => return Some(Self::TicketDelete),
            TICKET_CANCEL_DELETE => return Some(Self::TicketCancelDelete),
            GIVEAWAY_CREATE => return Some(Self::GiveawayCreate),
            _ => {}
        }

        let mut parts = custom_id.split(':');
        if parts.next()? != "gw" {
            return None;
        }
        let action = match (parts.next()?, parts.next()?) {
            ("set", field) => Self::GiveawaySet(parse_field(field)?),
            ("toggle", flag) => Self::GiveawayToggle(parse_flag(flag)?),
            ("enter", kind) => {
                let kind = match kind {
                    "normal" => EntryKind::Normal,
                    "bonus" | "star" => EntryKind::Bonus,
                    _ => return None,
                };
                let giveaway_id = Uuid::parse_str(parts.next()?).ok()?;
                Self::GiveawayEnter { giveaway_id, kind }
            }
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(action)
    }

    pub fn custom_id(&self) -> String {
        match self {
            Self::TicketTopic => TICKET_TOPIC_SELECT.to_string(),
            Self::TicketOpen => TICKET_OPEN.to_string(),
            Self::TicketClose => TICKET_CLOSE.to_string(),
            Self::TicketDelete => TICKET_DELETE.to_string(),
            Self::TicketCancelDelete => TICKET_CANCEL_DELETE.to_string(),
            Self::GiveawaySet(field) => format!("gw:set:{}", field_token(*field)),
            Self::GiveawayToggle(flag) => format!("gw:toggle:{}", flag_token(*flag)),
            Self::GiveawayCreate => GIVEAWAY_CREATE.to_string(),
            Self::GiveawayEnter { giveaway_id, kind } => {
                let kind = match kind {
                    EntryKind::Normal => "normal",
                    EntryKind::Bonus => "bonus",
                };
                format!("gw:enter:{}:{}", kind, giveaway_id)
            }
        }
    }
}

impl ModalAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if custom_id == TICKET_OTHER_MODAL {
            return Some(Self::TicketOtherTopic);
        }
        let field = custom_id.strip_prefix("gw:modal:")?;
        parse_field(field).map(Self::GiveawayField)
    }

    pub fn custom_id(&self) -> String {
        match self {
            Self::TicketOtherTopic => TICKET_OTHER_MODAL.to_string(),
            Self::GiveawayField(field) => format!("gw:modal:{}", field_token(*field)),
        }
    }
}
