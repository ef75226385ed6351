pub mod lifecycle;

use std::sync::Arc;

use tracing::{info, warn};

use crate::store::{DocumentStore, StoreResult};
use crate::types::{Fact, FactDraft};

/// CRUD over a user's structured facts, with boundary validation applied
/// before anything is persisted.
pub struct FactStore {
    store: Arc<dyn DocumentStore>,
}

impl FactStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Validate and persist one extracted fact.
    pub async fn save(&self, user_id: &str, draft: FactDraft) -> anyhow::Result<Fact> {
        let new_fact = draft.validate()?;
        let fact = self.store.add_fact(user_id, new_fact).await?;
        info!(user_id, fact_id = %fact.id, category = %fact.category, "saved new fact");
        Ok(fact)
    }

    /// Persist every valid draft. Invalid drafts are logged and skipped;
    /// one malformed fact never blocks the rest of the batch.
    pub async fn save_all(&self, user_id: &str, drafts: Vec<FactDraft>) -> usize {
        let mut saved = 0;
        for draft in drafts {
            match self.save(user_id, draft).await {
                Ok(_) => saved += 1,
                Err(e) => warn!(user_id, "skipping invalid fact: {e}"),
            }
        }
        saved
    }

    pub async fn all(&self, user_id: &str) -> StoreResult<Vec<Fact>> {
        self.store.facts(user_id).await
    }

    /// Facts matching the integer ids cited by the analysis model.
    /// Hallucinated ids with no matching document are silently omitted.
    pub async fn by_ids(&self, user_id: &str, ids: &[i64]) -> StoreResult<Vec<Fact>> {
        self.store.facts_by_ids(user_id, ids).await
    }
}
