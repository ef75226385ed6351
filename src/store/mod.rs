pub mod memory;

use async_trait::async_trait;

use crate::types::{ChatRole, Fact, NewFact, StoredMessage, Summary};

/// Errors surfaced by document store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested document does not exist. This is an explicit signal,
    /// never a default value silently substituted as valid data.
    #[error("document not found: {0}")]
    NotFound(String),
    /// Any other backend failure. The caller decides retry-vs-skip-vs-fallback.
    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-user hierarchical document collections: messages, summaries, facts,
/// plus the global processed-update set and per-user system prompts.
///
/// Two guarantees every implementation must provide:
///
/// - **Transactional sequential ids**: `add_message` and `add_fact`
///   allocate ids by atomically read-increment-writing a per-user counter
///   (independent `history` and `factology` namespaces) and committing the
///   new document in the same transaction. Concurrent callers never
///   collide; id order matches commit order. A missing counter means
///   "start at zero", so the first allocated id is `"1"`.
/// - **Batch delete**: deletes a list of documents in one batch and
///   returns the count actually deleted. An empty list deletes nothing and
///   is not an error.
///
/// Counter documents are the only contended shared-write resource and are
/// only ever touched inside the allocation transaction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- history ---

    async fn add_message(
        &self,
        user_id: &str,
        role: ChatRole,
        content: &str,
    ) -> StoreResult<StoredMessage>;

    /// Full history for a user, oldest first.
    async fn history(&self, user_id: &str) -> StoreResult<Vec<StoredMessage>>;

    async fn delete_messages(&self, user_id: &str, ids: &[String]) -> StoreResult<usize>;

    // --- summaries ---

    async fn add_summary(&self, user_id: &str, content: &str) -> StoreResult<Summary>;

    /// All summaries for a user, ascending by timestamp.
    async fn summaries(&self, user_id: &str) -> StoreResult<Vec<Summary>>;

    async fn delete_summaries(&self, user_id: &str, ids: &[String]) -> StoreResult<usize>;

    // --- facts ---

    async fn add_fact(&self, user_id: &str, fact: NewFact) -> StoreResult<Fact>;

    async fn facts(&self, user_id: &str) -> StoreResult<Vec<Fact>>;

    /// Look up facts by the integer ids an external model referenced.
    /// Ids with no matching document are omitted, not an error: the model
    /// may cite a fact that was merged or pruned away.
    async fn facts_by_ids(&self, user_id: &str, ids: &[i64]) -> StoreResult<Vec<Fact>>;

    /// Overwrite content and/or hot score of one fact. The timestamp is
    /// left untouched. Returns `NotFound` if the fact does not exist.
    async fn set_fact_fields(
        &self,
        user_id: &str,
        fact_id: &str,
        content: Option<&str>,
        hot: Option<f64>,
    ) -> StoreResult<()>;

    /// Additive, concurrency-safe increment of one fact's hot score.
    async fn increment_fact_hot(
        &self,
        user_id: &str,
        fact_id: &str,
        delta: f64,
    ) -> StoreResult<()>;

    async fn delete_facts(&self, user_id: &str, ids: &[String]) -> StoreResult<usize>;

    // --- processed updates (global, keyed by channel event id) ---

    async fn has_processed_update(&self, update_id: i64) -> StoreResult<bool>;

    async fn mark_update_processed(&self, update_id: i64) -> StoreResult<()>;

    // --- system prompts ---

    async fn system_prompt(&self, user_id: &str) -> StoreResult<Option<String>>;

    async fn set_system_prompt(&self, user_id: &str, prompt: &str) -> StoreResult<()>;
}
