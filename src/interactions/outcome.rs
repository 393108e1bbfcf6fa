use crate::engine::Intent;
use crate::error::BotError;
use crate::platform::MessageContent;

/// How an interaction answer is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Ephemeral reply to the actor
    Private(MessageContent),
    /// Visible reply in the channel
    Public(MessageContent),
    /// Replace the message the component belongs to
    Update(MessageContent),
    /// Open a modal for further input
    Modal(ModalRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalRequest {
    pub custom_id: String,
    pub title: String,
    pub input_id: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub value: Option<String>,
    pub long: bool,
    pub required: bool,
    pub max_length: Option<u16>,
}

/// Result of handling one interaction: the acknowledgment plus the side
/// effects to issue once it has been sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ack: Ack,
    pub intents: Vec<Intent>,
}

impl Outcome {
    pub fn private(text: impl Into<String>) -> Self {
        Self {
            ack: Ack::Private(MessageContent::text(text)),
            intents: Vec::new(),
        }
    }

    pub fn private_content(content: MessageContent) -> Self {
        Self {
            ack: Ack::Private(content),
            intents: Vec::new(),
        }
    }

    pub fn public(content: MessageContent) -> Self {
        Self {
            ack: Ack::Public(content),
            intents: Vec::new(),
        }
    }

    pub fn update(content: MessageContent) -> Self {
        Self {
            ack: Ack::Update(content),
            intents: Vec::new(),
        }
    }

    pub fn modal(request: ModalRequest) -> Self {
        Self {
            ack: Ack::Modal(request),
            intents: Vec::new(),
        }
    }

    /// Ephemeral rejection for an error. Internal failures get a generic text.
    pub fn from_error(error: &BotError) -> Self {
        Self::private(error.user_message())
    }

    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents.extend(intents);
        self
    }

    /// Text of the acknowledgment, if any
    pub fn text(&self) -> Option<&str> {
        match &self.ack {
            Ack::Private(c) | Ack::Public(c) | Ack::Update(c) => c.text.as_deref(),
            Ack::Modal(_) => None,
        }
    }
}
