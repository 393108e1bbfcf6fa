use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, MessageId, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BotError, Result};
use crate::models::{grant_key, ExpiringGrant, Giveaway, GrantKind, Ticket};
use crate::state::BotDatabase;

/// Persistent entity store.
///
/// Every mutation runs under a single write guard, so the predicate of a
/// conditional update and its patch are atomic with respect to each other.
/// After each committed mutation the document is written to disk. If that
/// write fails the in-memory state stays authoritative and the store is
/// flagged dirty until [`EntityStore::flush`] succeeds.
pub struct EntityStore {
    db: RwLock<BotDatabase>,
    path: Option<String>,
    dirty: AtomicBool,
}

pub type SharedEntityStore = Arc<EntityStore>;

pub fn create_shared_entity_store(store: EntityStore) -> SharedEntityStore {
    Arc::new(store)
}

impl EntityStore {
    /// Store without a backing file
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            db: RwLock::new(BotDatabase::new()),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Open the store backed by the given file
    pub async fn open(path: &str) -> Result<Self> {
        let db = BotDatabase::load(path).await?;
        debug!(
            "Loaded state from {}: {} tickets, {} giveaways, {} grants",
            path,
            db.tickets.len(),
            db.giveaways.len(),
            db.grants.len()
        );
        Ok(Self {
            db: RwLock::new(db),
            path: Some(path.to_string()),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    async fn persist(&self, db: &mut BotDatabase) {
        db.touch();
        let Some(path) = &self.path else {
            return;
        };
        match db.save(path).await {
            Ok(()) => self.dirty.store(false, Ordering::SeqCst),
            Err(e) => {
                warn!("State write failed, will retry on next sweep: {}", e);
                self.dirty.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Retry a previously failed write
    pub async fn flush(&self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };
        let db = self.db.write().await;
        db.save(path).await?;
        self.dirty.store(false, Ordering::SeqCst);
        debug!("Flushed pending state to {}", path);
        Ok(())
    }

    // Tickets

    pub async fn find_ticket(&self, channel_id: ChannelId) -> Option<Ticket> {
        let db = self.db.read().await;
        db.tickets.get(&channel_id.to_string()).cloned()
    }

    /// Insert a new ticket. A channel can only ever hold one ticket.
    pub async fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket> {
        let mut db = self.db.write().await;
        let key = ticket.channel_id.to_string();
        if db.tickets.contains_key(&key) {
            return Err(BotError::conflict("This channel already has a ticket."));
        }
        db.tickets.insert(key, ticket.clone());
        self.persist(&mut db).await;
        Ok(ticket)
    }

    /// Apply `patch` only if `predicate` holds on the current record.
    /// Returns the updated ticket, or `None` when the ticket is missing or the
    /// predicate failed.
    pub async fn update_ticket_if<P, F>(
        &self,
        channel_id: ChannelId,
        predicate: P,
        patch: F,
    ) -> Option<Ticket>
    where
        P: FnOnce(&Ticket) -> bool,
        F: FnOnce(&mut Ticket),
    {
        let mut db = self.db.write().await;
        let ticket = db.tickets.get_mut(&channel_id.to_string())?;
        if !predicate(ticket) {
            return None;
        }
        patch(ticket);
        let updated = ticket.clone();
        self.persist(&mut db).await;
        Some(updated)
    }

    /// Closed tickets whose delete time has passed, oldest first
    pub async fn due_tickets(&self, now: DateTime<Utc>, limit: usize) -> Vec<Ticket> {
        let db = self.db.read().await;
        let mut due: Vec<Ticket> = db
            .tickets
            .values()
            .filter(|t| t.is_closed() && t.delete_at.is_some_and(|at| now >= at))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.delete_at);
        due.truncate(limit);
        due
    }

    pub async fn open_ticket_count(&self) -> usize {
        let db = self.db.read().await;
        db.tickets.values().filter(|t| t.is_open()).count()
    }

    /// Atomic increment-and-fetch
    pub async fn next_sequence(&self, counter: &str) -> u64 {
        let mut db = self.db.write().await;
        let value = {
            let entry = db.counters.entry(counter.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.persist(&mut db).await;
        value
    }

    // Giveaways

    pub async fn find_giveaway(&self, id: Uuid) -> Option<Giveaway> {
        let db = self.db.read().await;
        db.giveaways.get(&id.to_string()).cloned()
    }

    pub async fn find_giveaway_by_message(&self, message_id: MessageId) -> Option<Giveaway> {
        let db = self.db.read().await;
        db.giveaways
            .values()
            .find(|g| g.message_id == Some(message_id))
            .cloned()
    }

    pub async fn insert_giveaway(&self, giveaway: Giveaway) -> Result<Giveaway> {
        let mut db = self.db.write().await;
        let key = giveaway.id.to_string();
        if db.giveaways.contains_key(&key) {
            return Err(BotError::conflict("Giveaway already exists."));
        }
        db.giveaways.insert(key, giveaway.clone());
        self.persist(&mut db).await;
        Ok(giveaway)
    }

    /// Conditional update, see [`EntityStore::update_ticket_if`]
    pub async fn update_giveaway_if<P, F>(&self, id: Uuid, predicate: P, patch: F) -> Option<Giveaway>
    where
        P: FnOnce(&Giveaway) -> bool,
        F: FnOnce(&mut Giveaway),
    {
        let mut db = self.db.write().await;
        let giveaway = db.giveaways.get_mut(&id.to_string())?;
        if !predicate(giveaway) {
            return None;
        }
        patch(giveaway);
        let updated = giveaway.clone();
        self.persist(&mut db).await;
        Some(updated)
    }

    /// Unended giveaways whose end time has passed, earliest first
    pub async fn due_giveaways(&self, now: DateTime<Utc>, limit: usize) -> Vec<Giveaway> {
        let db = self.db.read().await;
        let mut due: Vec<Giveaway> = db
            .giveaways
            .values()
            .filter(|g| g.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|g| g.ends_at);
        due.truncate(limit);
        due
    }

    pub async fn active_giveaways(&self) -> Vec<Giveaway> {
        let db = self.db.read().await;
        let mut active: Vec<Giveaway> = db
            .giveaways
            .values()
            .filter(|g| !g.ended)
            .cloned()
            .collect();
        active.sort_by_key(|g| g.ends_at);
        active
    }

    // Grants

    pub async fn find_grant(&self, kind: GrantKind, subject: UserId) -> Option<ExpiringGrant> {
        let db = self.db.read().await;
        db.grants.get(&grant_key(kind, subject)).cloned()
    }

    /// Insert or replace. Returns the grant that was replaced, if any.
    pub async fn upsert_grant(&self, grant: ExpiringGrant) -> Option<ExpiringGrant> {
        let mut db = self.db.write().await;
        let previous = db.grants.insert(grant.key(), grant);
        self.persist(&mut db).await;
        previous
    }

    /// Remove a grant only if `predicate` holds on the current record
    pub async fn remove_grant_if<P>(
        &self,
        kind: GrantKind,
        subject: UserId,
        predicate: P,
    ) -> Option<ExpiringGrant>
    where
        P: FnOnce(&ExpiringGrant) -> bool,
    {
        let mut db = self.db.write().await;
        let key = grant_key(kind, subject);
        if !predicate(db.grants.get(&key)?) {
            return None;
        }
        let removed = db.grants.remove(&key);
        self.persist(&mut db).await;
        removed
    }

    /// Grants past their expiry, earliest first
    pub async fn expired_grants(&self, now: DateTime<Utc>, limit: usize) -> Vec<ExpiringGrant> {
        let db = self.db.read().await;
        let mut expired: Vec<ExpiringGrant> = db
            .grants
            .values()
            .filter(|g| !g.is_active(now))
            .cloned()
            .collect();
        expired.sort_by_key(|g| g.expires_at);
        expired.truncate(limit);
        expired
    }

    /// Unexpired grants of one kind, soonest expiry first
    pub async fn active_grants(&self, kind: GrantKind, now: DateTime<Utc>) -> Vec<ExpiringGrant> {
        let db = self.db.read().await;
        let mut active: Vec<ExpiringGrant> = db
            .grants
            .values()
            .filter(|g| g.kind == kind && g.is_active(now))
            .cloned()
            .collect();
        active.sort_by_key(|g| g.expires_at);
        active
    }
}
