use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{ExpiringGrant, Giveaway, Ticket};

/// Durable document holding every persisted entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotDatabase {
    /// Schema version for migrations
    pub version: u32,

    /// Last update timestamp
    pub last_updated: u64,

    /// Tickets keyed by channel ID
    #[serde(default)]
    pub tickets: HashMap<String, Ticket>,

    /// Giveaways keyed by giveaway ID
    #[serde(default)]
    pub giveaways: HashMap<String, Giveaway>,

    /// Grants keyed by `kind:subject`
    #[serde(default)]
    pub grants: HashMap<String, ExpiringGrant>,

    /// Named monotonic counters
    #[serde(default)]
    pub counters: HashMap<String, u64>,
}

impl Default for BotDatabase {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: current_timestamp(),
            tickets: HashMap::new(),
            giveaways: HashMap::new(),
            grants: HashMap::new(),
            counters: HashMap::new(),
        }
    }
}

impl BotDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or create new if not exists
    pub async fn load(path: &str) -> crate::error::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| crate::error::BotError::StateParse {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(crate::error::BotError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically
    pub async fn save(&self, path: &str) -> crate::error::Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content).await.map_err(|e| {
            crate::error::BotError::StateSave {
                path: path.to_string(),
                source: e,
            }
        })?;

        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            crate::error::BotError::StateSave {
                path: path.to_string(),
                source: e,
            }
        })?;

        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_updated = current_timestamp();
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        let db = BotDatabase::load(path.to_str().unwrap()).await.unwrap();
        assert!(db.tickets.is_empty());
        assert_eq!(db.version, 1);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        let path = path.to_str().unwrap();

        let mut db = BotDatabase::new();
        db.counters.insert("ticket".to_string(), 41);
        db.save(path).await.unwrap();

        let loaded = BotDatabase::load(path).await.unwrap();
        assert_eq!(loaded.counters.get("ticket"), Some(&41));
        assert!(!std::path::Path::new(&format!("{}.tmp", path)).exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_state.json");
        std::fs::write(&path, "{not json").unwrap();
        let result = BotDatabase::load(path.to_str().unwrap()).await;
        assert!(matches!(
            result,
            Err(crate::error::BotError::StateParse { .. })
        ));
    }
}
