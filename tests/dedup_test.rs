use std::sync::Arc;

use async_trait::async_trait;
use confide::dedup::UpdateGuard;
use confide::store::memory::MemoryStore;
use confide::store::{DocumentStore, StoreError, StoreResult};
use confide::types::{ChatRole, Fact, NewFact, StoredMessage, Summary};

#[tokio::test]
async fn guard_marks_and_detects_duplicates() {
    let guard = UpdateGuard::new(Arc::new(MemoryStore::new()));

    assert!(!guard.has_processed(42).await);
    guard.mark_processed(42).await;
    assert!(guard.has_processed(42).await);
    assert!(!guard.has_processed(43).await);
}

/// Store whose every operation fails, for exercising failure paths.
struct FailingStore;

fn backend_err<T>() -> StoreResult<T> {
    Err(StoreError::Backend("injected failure".into()))
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn add_message(&self, _: &str, _: ChatRole, _: &str) -> StoreResult<StoredMessage> {
        backend_err()
    }
    async fn history(&self, _: &str) -> StoreResult<Vec<StoredMessage>> {
        backend_err()
    }
    async fn delete_messages(&self, _: &str, _: &[String]) -> StoreResult<usize> {
        backend_err()
    }
    async fn add_summary(&self, _: &str, _: &str) -> StoreResult<Summary> {
        backend_err()
    }
    async fn summaries(&self, _: &str) -> StoreResult<Vec<Summary>> {
        backend_err()
    }
    async fn delete_summaries(&self, _: &str, _: &[String]) -> StoreResult<usize> {
        backend_err()
    }
    async fn add_fact(&self, _: &str, _: NewFact) -> StoreResult<Fact> {
        backend_err()
    }
    async fn facts(&self, _: &str) -> StoreResult<Vec<Fact>> {
        backend_err()
    }
    async fn facts_by_ids(&self, _: &str, _: &[i64]) -> StoreResult<Vec<Fact>> {
        backend_err()
    }
    async fn set_fact_fields(
        &self,
        _: &str,
        _: &str,
        _: Option<&str>,
        _: Option<f64>,
    ) -> StoreResult<()> {
        backend_err()
    }
    async fn increment_fact_hot(&self, _: &str, _: &str, _: f64) -> StoreResult<()> {
        backend_err()
    }
    async fn delete_facts(&self, _: &str, _: &[String]) -> StoreResult<usize> {
        backend_err()
    }
    async fn has_processed_update(&self, _: i64) -> StoreResult<bool> {
        backend_err()
    }
    async fn mark_update_processed(&self, _: i64) -> StoreResult<()> {
        backend_err()
    }
    async fn system_prompt(&self, _: &str) -> StoreResult<Option<String>> {
        backend_err()
    }
    async fn set_system_prompt(&self, _: &str, _: &str) -> StoreResult<()> {
        backend_err()
    }
}

#[tokio::test]
async fn failed_check_fails_open() {
    let guard = UpdateGuard::new(Arc::new(FailingStore));

    // A broken existence check must default to "not processed": risking a
    // duplicate beats silently dropping a message.
    assert!(!guard.has_processed(42).await);

    // Marking on a broken store must not panic either.
    guard.mark_processed(42).await;
}
