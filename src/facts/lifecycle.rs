use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::store::DocumentStore;
use crate::types::{Fact, ReorganisationAction};

/// Multiplicative decay applied to facts the analysis model did not reference.
const DECAY_FACTOR: f64 = 0.995;
/// Facts colder than this and older than [`PRUNE_AGE_DAYS`] are removed.
const PRUNE_HOT_THRESHOLD: f64 = 0.03;
const PRUNE_AGE_DAYS: i64 = 60;

/// The decay/merge/prune policy that keeps a user's fact store small and
/// relevant, driven by the companion model's per-turn analysis.
///
/// Within one turn the order is increment, then merge, then prune: merge
/// reads the post-increment hot scores to choose the heir and to sum.
/// Decay is the complement of increment (it covers every fact the model
/// did not reference) and runs last.
///
/// Each operation is independently best-effort per item — a failure on one
/// fact or action is logged and never blocks the others.
pub struct FactLifecycle {
    store: Arc<dyn DocumentStore>,
}

impl FactLifecycle {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Increment `hot` by 1 for each referenced fact, using the store's
    /// additive increment so concurrent turns never lose a bump.
    pub async fn update_hot_scores(&self, user_id: &str, referenced: &[i64]) {
        for id in referenced {
            let fact_id = id.to_string();
            match self.store.increment_fact_hot(user_id, &fact_id, 1.0).await {
                Ok(()) => debug!(user_id, fact_id = %fact_id, "incremented hot score"),
                Err(e) => warn!(user_id, fact_id = %fact_id, "could not increment hot score: {e}"),
            }
        }
    }

    /// Multiply `hot` by the decay factor for every fact NOT in the
    /// referenced set. Read-then-write per fact is fine here: decay is
    /// approximate and self-correcting over successive turns.
    pub async fn decay_hot_scores(&self, user_id: &str, referenced: &[i64]) {
        let facts = match self.store.facts(user_id).await {
            Ok(facts) => facts,
            Err(e) => {
                error!(user_id, "could not load facts for decay: {e}");
                return;
            }
        };
        if facts.is_empty() {
            return;
        }

        let referenced: HashSet<String> = referenced.iter().map(|id| id.to_string()).collect();

        let updates = facts
            .iter()
            .filter(|f| !referenced.contains(&f.id))
            .map(|f| {
                let store = Arc::clone(&self.store);
                let fact_id = f.id.clone();
                let decayed = f.hot * DECAY_FACTOR;
                async move {
                    store
                        .set_fact_fields(user_id, &fact_id, None, Some(decayed))
                        .await
                        .map_err(|e| (fact_id, e))
                }
            });

        let mut decayed = 0;
        for result in futures::future::join_all(updates).await {
            match result {
                Ok(()) => decayed += 1,
                Err((fact_id, e)) => warn!(user_id, fact_id = %fact_id, "decay write failed: {e}"),
            }
        }
        debug!(user_id, decayed, "applied hot score decay");
    }

    /// Apply the model's merge plan. Each action names 2-3 fact ids and the
    /// combined replacement content. The heir is the hottest fact of the
    /// set (lowest id on ties); it takes the new content and the summed hot
    /// score, keeps its timestamp, and the rest are batch-deleted.
    pub async fn merge_facts(&self, user_id: &str, actions: &[ReorganisationAction]) {
        for action in actions {
            if !action.action.eq_ignore_ascii_case("merge") || action.ids.is_empty() {
                continue;
            }

            let found = match self.store.facts_by_ids(user_id, &action.ids).await {
                Ok(found) => found,
                Err(e) => {
                    error!(user_id, ids = ?action.ids, "could not load facts for merge: {e}");
                    continue;
                }
            };

            // The model may cite facts a previous action already deleted.
            if found.len() < 2 {
                warn!(
                    user_id,
                    ids = ?action.ids,
                    found = found.len(),
                    "not enough facts found for merge, skipping action"
                );
                continue;
            }

            let heir = choose_heir(&found);
            let total_hot: f64 = found.iter().map(|f| f.hot).sum();

            // New content and summed score; timestamp deliberately untouched
            // so the heir keeps its original recency.
            if let Err(e) = self
                .store
                .set_fact_fields(user_id, &heir.id, Some(&action.final_content), Some(total_hot))
                .await
            {
                error!(user_id, heir = %heir.id, "could not update merge heir: {e}");
                continue;
            }

            let losers: Vec<String> = found
                .iter()
                .filter(|f| f.id != heir.id)
                .map(|f| f.id.clone())
                .collect();
            match self.store.delete_facts(user_id, &losers).await {
                Ok(deleted) => {
                    info!(user_id, heir = %heir.id, merged = deleted, "merged facts into heir")
                }
                Err(e) => error!(user_id, heir = %heir.id, "could not delete merged facts: {e}"),
            }
        }
    }

    /// Delete every fact that is both cold (`hot` below the threshold) and
    /// stale (older than the cutoff). The typed store guarantees every
    /// fact carries a parseable timestamp, so age alone never misfires.
    pub async fn prune_facts(&self, user_id: &str) {
        let facts = match self.store.facts(user_id).await {
            Ok(facts) => facts,
            Err(e) => {
                error!(user_id, "could not load facts for pruning: {e}");
                return;
            }
        };
        if facts.is_empty() {
            return;
        }

        let cutoff = Utc::now() - Duration::days(PRUNE_AGE_DAYS);
        let stale: Vec<String> = facts
            .iter()
            .filter(|f| f.hot < PRUNE_HOT_THRESHOLD && f.timestamp < cutoff)
            .map(|f| f.id.clone())
            .collect();

        if stale.is_empty() {
            return;
        }

        match self.store.delete_facts(user_id, &stale).await {
            Ok(deleted) => info!(user_id, deleted, "pruned cold facts"),
            Err(e) => error!(user_id, "fact pruning failed: {e}"),
        }
    }
}

/// Highest hot score wins; equal scores fall back to the lowest id so the
/// outcome never depends on store iteration order.
fn choose_heir(facts: &[Fact]) -> &Fact {
    let mut heir = &facts[0];
    for fact in &facts[1..] {
        if fact.hot > heir.hot || (fact.hot == heir.hot && id_num(fact) < id_num(heir)) {
            heir = fact;
        }
    }
    heir
}

fn id_num(fact: &Fact) -> i64 {
    fact.id.parse().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use chrono::Utc;

    fn fact(id: &str, hot: f64) -> Fact {
        Fact {
            id: id.into(),
            category: "events".into(),
            content: "c".into(),
            priority: Priority::Mid,
            hot,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn heir_is_hottest_fact() {
        let facts = vec![fact("1", 2.0), fact("2", 5.0), fact("3", 1.0)];
        assert_eq!(choose_heir(&facts).id, "2");
    }

    #[test]
    fn heir_tie_breaks_to_lowest_id() {
        let facts = vec![fact("7", 3.0), fact("2", 3.0), fact("9", 3.0)];
        assert_eq!(choose_heir(&facts).id, "2");
    }
}
