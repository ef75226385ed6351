use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::MemoryConfig;
use crate::inference::InferenceProvider;
use crate::store::{DocumentStore, StoreResult};
use crate::types::{ChatRole, StoredMessage};

/// Returned when the summarizer is handed an empty block.
pub const EMPTY_SUMMARY_SENTINEL: &str = "No messages to summarize.";

/// Thin proxy over the inference service's summarization call.
pub struct Summarizer {
    provider: Arc<dyn InferenceProvider>,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        Self { provider }
    }

    /// Condense formatted conversation lines into a short summary.
    /// An empty input yields the sentinel without touching the service.
    pub async fn summarize(&self, lines: &[String]) -> anyhow::Result<String> {
        if lines.is_empty() {
            warn!("no messages provided for summarization");
            return Ok(EMPTY_SUMMARY_SENTINEL.to_string());
        }
        self.provider.summarize(lines).await
    }
}

/// Maintains the bounded conversation window: once enough complete
/// user+assistant pairs accumulate, the oldest block is summarized,
/// stored, and trimmed.
pub struct HistoryRotator {
    store: Arc<dyn DocumentStore>,
    summarizer: Summarizer,
    threshold_messages: usize,
    summarize_count: usize,
    max_summaries: usize,
}

impl HistoryRotator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn InferenceProvider>,
        config: &MemoryConfig,
    ) -> Self {
        Self {
            store,
            summarizer: Summarizer::new(provider),
            threshold_messages: config.history_threshold_messages as usize,
            summarize_count: config.messages_to_summarize as usize,
            max_summaries: config.max_summaries as usize,
        }
    }

    /// Fetch the user's ordered history and rotate if it has grown too
    /// large. Returns the history as it stands after any trim.
    ///
    /// The trigger counts complete pairs only, so a dangling unanswered
    /// user message never lands inside a summary block mid-exchange.
    pub async fn manage(&self, user_id: &str) -> StoreResult<Vec<StoredMessage>> {
        let history = self.store.history(user_id).await?;

        let user_count = history
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .count();
        let assistant_count = history.len() - user_count;
        let complete_pairs = user_count.min(assistant_count);
        let in_pairs = complete_pairs * 2;

        if in_pairs < self.threshold_messages {
            debug!(
                user_id,
                total = history.len(),
                complete_pairs,
                "history within threshold, no rotation"
            );
            return Ok(history);
        }

        info!(
            user_id,
            total = history.len(),
            complete_pairs,
            threshold = self.threshold_messages,
            "history over threshold, rotating"
        );

        let take = self.summarize_count.min(history.len());
        let (block, remaining) = history.split_at(take);

        let lines: Vec<String> = block
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect();

        // If summarization fails nothing has been deleted yet; leave the
        // history intact and let the next turn retry the rotation.
        let summary_text = self
            .summarizer
            .summarize(&lines)
            .await
            .map_err(|e| crate::store::StoreError::Backend(format!("summarization failed: {e}")))?;

        self.store.add_summary(user_id, &summary_text).await?;
        self.enforce_summary_cap(user_id).await;

        let ids: Vec<String> = block.iter().map(|m| m.id.clone()).collect();
        match self.store.delete_messages(user_id, &ids).await {
            Ok(deleted) => {
                info!(
                    user_id,
                    summarized = block.len(),
                    deleted,
                    remaining = remaining.len(),
                    "history trimmed, summary stored"
                );
            }
            Err(e) => {
                // The summary is already durable; stale messages get picked
                // up again on the next rotation.
                warn!(user_id, "failed to delete summarized messages: {e}");
            }
        }

        Ok(remaining.to_vec())
    }

    /// FIFO cap on stored summaries: oldest beyond `max_summaries` go in
    /// one batch. A failure here leaves the overflow for the next rotation
    /// to heal; the freshly added summary is never rolled back.
    async fn enforce_summary_cap(&self, user_id: &str) {
        let result: StoreResult<()> = async {
            let summaries = self.store.summaries(user_id).await?;
            if summaries.len() > self.max_summaries {
                let excess = summaries.len() - self.max_summaries;
                let ids: Vec<String> = summaries[..excess].iter().map(|s| s.id.clone()).collect();
                let deleted = self.store.delete_summaries(user_id, &ids).await?;
                info!(user_id, deleted, max = self.max_summaries, "trimmed oldest summaries");
            }
            Ok(())
        }
        .await;

        if let Err(e) = result {
            error!(user_id, "failed to enforce summary cap: {e}");
        }
    }
}
