use std::sync::Arc;

use chrono::{Duration, Utc};
use confide::facts::lifecycle::FactLifecycle;
use confide::store::DocumentStore;
use confide::store::memory::MemoryStore;
use confide::types::{Fact, NewFact, Priority, ReorganisationAction};

async fn seed_fact(store: &MemoryStore, content: &str, hot: f64, age_days: i64) -> Fact {
    store
        .add_fact(
            "u1",
            NewFact {
                category: "events".into(),
                content: content.into(),
                priority: Priority::Mid,
                hot,
                timestamp: Utc::now() - Duration::days(age_days),
            },
        )
        .await
        .unwrap()
}

fn merge_action(ids: Vec<i64>, final_content: &str) -> ReorganisationAction {
    ReorganisationAction {
        action: "merge".into(),
        ids,
        final_content: final_content.into(),
        reason: "duplicates".into(),
    }
}

async fn fact_by_id(store: &MemoryStore, id: &str) -> Option<Fact> {
    store
        .facts("u1")
        .await
        .unwrap()
        .into_iter()
        .find(|f| f.id == id)
}

#[tokio::test]
async fn increment_bumps_referenced_facts_only() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "a", 1.0, 0).await;
    seed_fact(&store, "b", 1.0, 0).await;

    lifecycle.update_hot_scores("u1", &[2]).await;

    assert_eq!(fact_by_id(&store, "1").await.unwrap().hot, 1.0);
    assert_eq!(fact_by_id(&store, "2").await.unwrap().hot, 2.0);
}

#[tokio::test]
async fn increment_skips_missing_facts() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "a", 1.0, 0).await;

    // Unknown id is logged and skipped, the rest still land.
    lifecycle.update_hot_scores("u1", &[99, 1]).await;
    assert_eq!(fact_by_id(&store, "1").await.unwrap().hot, 2.0);
}

#[tokio::test]
async fn decay_spares_referenced_facts() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "a", 1.0, 0).await;
    seed_fact(&store, "b", 2.0, 0).await;
    seed_fact(&store, "c", 4.0, 0).await;

    lifecycle.decay_hot_scores("u1", &[2]).await;

    assert_eq!(fact_by_id(&store, "1").await.unwrap().hot, 1.0 * 0.995);
    assert_eq!(fact_by_id(&store, "2").await.unwrap().hot, 2.0);
    assert_eq!(fact_by_id(&store, "3").await.unwrap().hot, 4.0 * 0.995);
}

#[tokio::test]
async fn merge_picks_hottest_heir_and_sums_scores() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "a", 2.0, 0).await;
    let original = seed_fact(&store, "b", 5.0, 3).await;
    seed_fact(&store, "c", 1.0, 0).await;

    lifecycle
        .merge_facts("u1", &[merge_action(vec![1, 2, 3], "combined fact")])
        .await;

    let facts = store.facts("u1").await.unwrap();
    assert_eq!(facts.len(), 1);

    let heir = &facts[0];
    assert_eq!(heir.id, "2");
    assert_eq!(heir.content, "combined fact");
    assert_eq!(heir.hot, 8.0);
    // Merges preserve the heir's original timestamp.
    assert_eq!(heir.timestamp, original.timestamp);
}

#[tokio::test]
async fn merge_with_fewer_than_two_found_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    let before = seed_fact(&store, "only", 1.5, 0).await;

    lifecycle
        .merge_facts("u1", &[merge_action(vec![1, 7], "should not apply")])
        .await;

    let facts = store.facts("u1").await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].content, before.content);
    assert_eq!(facts[0].hot, before.hot);
}

#[tokio::test]
async fn merge_ignores_non_merge_actions() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "a", 1.0, 0).await;
    seed_fact(&store, "b", 1.0, 0).await;

    let mut action = merge_action(vec![1, 2], "nope");
    action.action = "split".into();
    lifecycle.merge_facts("u1", &[action]).await;

    assert_eq!(store.facts("u1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn prune_requires_cold_and_stale() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    seed_fact(&store, "cold and old", 0.02, 61).await;
    seed_fact(&store, "cold but fresh", 0.02, 10).await;
    seed_fact(&store, "old but warm", 0.5, 100).await;

    lifecycle.prune_facts("u1").await;

    let remaining = store.facts("u1").await.unwrap();
    let contents: Vec<&str> = remaining.iter().map(|f| f.content.as_str()).collect();
    assert_eq!(contents, ["cold but fresh", "old but warm"]);
}

#[tokio::test]
async fn increment_then_merge_uses_post_increment_scores() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = FactLifecycle::new(store.clone() as Arc<dyn DocumentStore>);

    // Fact 1 starts hotter, but referencing fact 2 this turn flips the heir.
    seed_fact(&store, "a", 1.5, 0).await;
    seed_fact(&store, "b", 1.0, 0).await;

    lifecycle.update_hot_scores("u1", &[2]).await;
    lifecycle
        .merge_facts("u1", &[merge_action(vec![1, 2], "merged")])
        .await;

    let facts = store.facts("u1").await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].id, "2");
    assert_eq!(facts[0].hot, 3.5);
}
