use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{DocumentStore, StoreError, StoreResult};
use crate::types::{ChatRole, Fact, NewFact, StoredMessage, Summary};

/// In-process document store. Mirrors the hierarchical layout of the
/// production document database: per-user message/summary/fact collections
/// with sibling counter records, and a global processed-update set.
///
/// All state lives behind one async mutex, so a counter
/// read-increment-write and its paired document insert commit as a single
/// transaction: concurrent writers never observe the same id.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserState>,
    processed_updates: HashMap<i64, DateTime<Utc>>,
}

#[derive(Default)]
struct UserState {
    /// Counter namespaces: `history` for messages, `factology` for facts.
    counters: HashMap<&'static str, u64>,
    /// Keyed by numeric id, so iteration order is id order (= commit order).
    messages: BTreeMap<u64, StoredMessage>,
    summaries: Vec<Summary>,
    facts: BTreeMap<u64, Fact>,
    system_prompt: Option<String>,
}

impl UserState {
    fn next_id(&mut self, namespace: &'static str) -> u64 {
        let counter = self.counters.entry(namespace).or_insert(0);
        *counter += 1;
        *counter
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_id(id: &str) -> Option<u64> {
    id.parse().ok()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add_message(
        &self,
        user_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<StoredMessage> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.entry(user_id.to_string()).or_default();
        let id = user.next_id("history");
        let message = StoredMessage {
            id: id.to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        user.messages.insert(id, message.clone());
        debug!(user_id, message_id = id, "added {} message", role.as_str());
        Ok(message)
    }

    async fn history(&self, user_id: &str) -> StoreResult<Vec<StoredMessage>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .get(user_id)
            .map(|u| u.messages.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_messages(&self, user_id: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            return Ok(0);
        };
        let mut deleted = 0;
        for id in ids {
            if let Some(key) = parse_id(id) {
                if user.messages.remove(&key).is_some() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn add_summary(&self, user_id: &str, content: &str) -> StoreResult<Summary> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.entry(user_id.to_string()).or_default();
        let summary = Summary {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        user.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn summaries(&self, user_id: &str) -> StoreResult<Vec<Summary>> {
        let inner = self.inner.lock().await;
        let mut summaries: Vec<Summary> = inner
            .users
            .get(user_id)
            .map(|u| u.summaries.clone())
            .unwrap_or_default();
        // Stable sort: same-instant summaries keep insertion order.
        summaries.sort_by_key(|s| s.timestamp);
        Ok(summaries)
    }

    async fn delete_summaries(&self, user_id: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            return Ok(0);
        };
        let before = user.summaries.len();
        user.summaries.retain(|s| !ids.contains(&s.id));
        Ok(before - user.summaries.len())
    }

    async fn add_fact(&self, user_id: &str, fact: NewFact) -> StoreResult<Fact> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.entry(user_id.to_string()).or_default();
        let id = user.next_id("factology");
        let fact = Fact {
            id: id.to_string(),
            category: fact.category,
            content: fact.content,
            priority: fact.priority,
            hot: fact.hot,
            timestamp: fact.timestamp,
        };
        user.facts.insert(id, fact.clone());
        debug!(user_id, fact_id = id, "added fact");
        Ok(fact)
    }

    async fn facts(&self, user_id: &str) -> StoreResult<Vec<Fact>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .get(user_id)
            .map(|u| u.facts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn facts_by_ids(&self, user_id: &str, ids: &[i64]) -> StoreResult<Vec<Fact>> {
        let inner = self.inner.lock().await;
        let Some(user) = inner.users.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| u64::try_from(*id).ok())
            .filter_map(|id| user.facts.get(&id).cloned())
            .collect())
    }

    async fn set_fact_fields(
        &self,
        user_id: &str,
        fact_id: &str,
        content: Option<&str>,
        hot: Option<f64>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let fact = inner
            .users
            .get_mut(user_id)
            .and_then(|u| parse_id(fact_id).and_then(|id| u.facts.get_mut(&id)))
            .ok_or_else(|| StoreError::NotFound(format!("fact {fact_id} for user {user_id}")))?;
        if let Some(content) = content {
            fact.content = content.to_string();
        }
        if let Some(hot) = hot {
            fact.hot = hot;
        }
        Ok(())
    }

    async fn increment_fact_hot(
        &self,
        user_id: &str,
        fact_id: &str,
        delta: f64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let fact = inner
            .users
            .get_mut(user_id)
            .and_then(|u| parse_id(fact_id).and_then(|id| u.facts.get_mut(&id)))
            .ok_or_else(|| StoreError::NotFound(format!("fact {fact_id} for user {user_id}")))?;
        fact.hot += delta;
        Ok(())
    }

    async fn delete_facts(&self, user_id: &str, ids: &[String]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            return Ok(0);
        };
        let mut deleted = 0;
        for id in ids {
            if let Some(key) = parse_id(id) {
                if user.facts.remove(&key).is_some() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn has_processed_update(&self, update_id: i64) -> StoreResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.processed_updates.contains_key(&update_id))
    }

    async fn mark_update_processed(&self, update_id: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.processed_updates.insert(update_id, Utc::now());
        Ok(())
    }

    async fn system_prompt(&self, user_id: &str) -> StoreResult<Option<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .get(user_id)
            .and_then(|u| u.system_prompt.clone()))
    }

    async fn set_system_prompt(&self, user_id: &str, prompt: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner.users.entry(user_id.to_string()).or_default();
        user.system_prompt = Some(prompt.to_string());
        Ok(())
    }
}
