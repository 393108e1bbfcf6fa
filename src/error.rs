use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: dotenv::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Rejections surfaced to the actor
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    PermissionDenied { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{message}")]
    Conflict { message: String },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    pub fn validation(message: impl Into<String>) -> Self {
        BotError::Validation {
            message: message.into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        BotError::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        BotError::NotFound { what: what.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        BotError::Conflict {
            message: message.into(),
        }
    }

    /// Rejections that are answered to the actor verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BotError::Validation { .. }
                | BotError::PermissionDenied { .. }
                | BotError::NotFound { .. }
                | BotError::Conflict { .. }
        )
    }

    /// Text shown to the actor. Internal failures collapse into a generic reply.
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            "Something went wrong. Please try again later.".to_string()
        }
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

use poise::serenity_prelude as serenity;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_split() {
        assert!(BotError::validation("Winners must be between 1 and 25.").is_user_facing());
        assert!(BotError::denied("Admin only.").is_user_facing());
        assert!(BotError::conflict("Already running").is_user_facing());
        assert!(!BotError::Discord {
            message: "503".to_string()
        }
        .is_user_facing());
    }

    #[test]
    fn test_user_message_hides_internal_detail() {
        let err = BotError::Internal {
            message: "lock poisoned".to_string(),
        };
        assert!(!err.user_message().contains("poisoned"));
        assert_eq!(
            BotError::not_found("Giveaway").user_message(),
            "Giveaway not found"
        );
    }
}
