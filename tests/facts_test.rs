use std::sync::Arc;

use confide::facts::FactStore;
use confide::store::DocumentStore;
use confide::store::memory::MemoryStore;
use confide::types::{FactDraft, Priority};

fn draft(content: Option<&str>, description: Option<&str>, priority: &str) -> FactDraft {
    FactDraft {
        category: "personal_history".into(),
        content: content.map(String::from),
        description: description.map(String::from),
        priority: priority.into(),
    }
}

#[tokio::test]
async fn saving_normalizes_priority_synonyms() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    for raw in ["medium", "MEDIUM", "Medium"] {
        let fact = facts
            .save("u1", draft(Some("likes rain"), None, raw))
            .await
            .unwrap();
        assert_eq!(fact.priority, Priority::Mid);
    }

    let fact = facts
        .save("u1", draft(Some("afraid of deadlines"), None, "high"))
        .await
        .unwrap();
    assert_eq!(fact.priority, Priority::High);

    let fact = facts
        .save("u1", draft(Some("takes medication"), None, "Critical"))
        .await
        .unwrap();
    assert_eq!(fact.priority, Priority::Critical);
}

#[tokio::test]
async fn description_alias_backfills_content() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    let fact = facts
        .save("u1", draft(None, Some("X"), "Low"))
        .await
        .unwrap();
    assert_eq!(fact.content, "X");
    assert_eq!(fact.hot, 1.0);
}

#[tokio::test]
async fn empty_content_is_rejected_not_stored() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    assert!(facts.save("u1", draft(None, None, "Low")).await.is_err());
    assert!(
        facts
            .save("u1", draft(Some("  "), None, "Low"))
            .await
            .is_err()
    );
    assert!(store.facts("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_priority_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    assert!(
        facts
            .save("u1", draft(Some("something"), None, "urgent"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn save_all_skips_invalid_drafts() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    let drafts = vec![
        draft(Some("good one"), None, "High"),
        draft(None, None, "Low"),              // no content
        draft(Some("another"), None, "bogus"), // bad priority
        draft(None, Some("via alias"), "medium"),
    ];

    let saved = facts.save_all("u1", drafts).await;
    assert_eq!(saved, 2);

    let stored = store.facts("u1").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].content, "good one");
    assert_eq!(stored[1].content, "via alias");
    assert_eq!(stored[1].priority, Priority::Mid);
}

#[tokio::test]
async fn by_ids_tolerates_hallucinated_references() {
    let store = Arc::new(MemoryStore::new());
    let facts = FactStore::new(store.clone() as Arc<dyn DocumentStore>);

    facts
        .save("u1", draft(Some("real"), None, "Mid"))
        .await
        .unwrap();

    let found = facts.by_ids("u1", &[1, 999]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content, "real");
}
