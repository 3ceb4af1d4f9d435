// Integration tests for the connection registry under concurrent use

mod common;

use common::catalog;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;
use voice_relay::session::ConnectionRegistry;

#[tokio::test]
async fn test_concurrent_joins_and_leaves_converge() {
    let registry = Arc::new(ConnectionRegistry::new(catalog()));
    let languages = ["en", "es", "fr", "de"];

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let registry = registry.clone();
            let language = languages[i % languages.len()];
            tokio::spawn(async move {
                let (tx, rx) = mpsc::channel(1);
                let id = Uuid::new_v4();
                registry.join(id, Some(language), tx);
                // Every other connection leaves again
                if i % 2 == 1 {
                    registry.leave(id);
                }
                (id, rx)
            })
        })
        .collect();

    let mut kept = Vec::new();
    for task in tasks {
        kept.push(task.await.expect("join task"));
    }

    assert_eq!(registry.len(), 32);

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.listener_count(), 32);
    let counts: BTreeMap<String, usize> = registry.counts_by_language();
    assert_eq!(counts.get("en"), Some(&16));
    assert_eq!(counts.get("fr"), Some(&16));
    assert_eq!(counts.get("es"), None);
    assert_eq!(counts.get("de"), None);
}

#[tokio::test]
async fn test_snapshot_taken_during_churn_is_consistent() {
    let registry = Arc::new(ConnectionRegistry::new(catalog()));
    let id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(1);
    registry.join(id, Some("es"), tx.clone());

    let churn = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for i in 0..200 {
                let language = if i % 2 == 0 { "fr" } else { "es" };
                registry.set_language(id, language).expect("listener is registered");
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..50 {
        // The listener is always in exactly one partition
        let by_language = registry.snapshot().by_language();
        let memberships: usize = by_language.values().filter(|ids| ids.contains(&id)).count();
        assert_eq!(memberships, 1);
        tokio::task::yield_now().await;
    }

    churn.await.expect("churn task");
    assert_eq!(registry.language_of(id).as_deref(), Some("es"));
}

#[tokio::test]
async fn test_unsupported_join_falls_back_to_default() {
    let registry = ConnectionRegistry::new(catalog());
    let (tx, _rx) = mpsc::channel(1);

    let language = registry.join(Uuid::new_v4(), Some("xx-unknown"), tx.clone());
    assert_eq!(language, "en");

    let language = registry.join(Uuid::new_v4(), None, tx);
    assert_eq!(language, "en");

    assert_eq!(registry.counts_by_language().get("en"), Some(&2));
}
