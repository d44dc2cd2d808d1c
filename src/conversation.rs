//! Per-conversation turn history
//!
//! Owned by the surfaces (server, CLI), never by the router: the core only
//! sees the trimmed slice handed to it in a [`crate::models::QueryRequest`].

use crate::models::Turn;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

#[derive(Debug, Clone)]
struct Conversation {
    turns: Vec<Turn>,
    updated_at: DateTime<Utc>,
    /// Logical write clock, ordering conversations for eviction.
    touched: u64,
}

#[derive(Debug)]
pub struct ConversationStore {
    conversations: DashMap<String, Conversation>,
    max_len: usize,
    max_conversations: usize,
    clock: AtomicU64,
}

impl ConversationStore {
    pub fn new(max_len: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_len,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            clock: AtomicU64::new(0),
        }
    }

    /// Cap the number of live conversations; the least recently written one
    /// is dropped to make room for a new id.
    pub fn with_max_conversations(mut self, max_conversations: usize) -> Self {
        self.max_conversations = max_conversations.max(1);
        self
    }

    pub fn history(&self, id: &str) -> Vec<Turn> {
        self.conversations
            .get(id)
            .map(|c| c.turns.clone())
            .unwrap_or_default()
    }

    /// Record one exchange, keeping only the most recent `max_len` turns.
    pub fn append(&self, id: &str, user: &str, assistant: &str) {
        if !self.conversations.contains_key(id) {
            self.make_room();
        }

        let touched = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut entry = self
            .conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation {
                turns: Vec::new(),
                updated_at: Utc::now(),
                touched,
            });

        entry.turns.push(Turn::user(user));
        entry.turns.push(Turn::assistant(assistant));
        let excess = entry.turns.len().saturating_sub(self.max_len);
        if excess > 0 {
            entry.turns.drain(..excess);
        }
        entry.updated_at = Utc::now();
        entry.touched = touched;
        debug!("Conversation {} now holds {} turns", id, entry.turns.len());
    }

    fn make_room(&self) {
        while self.conversations.len() >= self.max_conversations {
            // clone the key so no shard guard is held during removal
            let oldest = self
                .conversations
                .iter()
                .min_by_key(|c| c.touched)
                .map(|c| c.key().clone());
            let Some(oldest) = oldest else { break };
            self.conversations.remove(&oldest);
            info!("🧹 Evicted conversation {} (store at capacity)", oldest);
        }
    }

    /// `false` when there was nothing to clear.
    pub fn clear(&self, id: &str) -> bool {
        self.conversations.remove(id).is_some()
    }

    pub fn last_updated(&self, id: &str) -> Option<DateTime<Utc>> {
        self.conversations.get(id).map(|c| c.updated_at)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(20)
    }
}
