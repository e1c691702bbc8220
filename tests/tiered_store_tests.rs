//! Fallback behavior of the tiered place store.

mod support;

use std::sync::Arc;

use skyscout_rust::store::{
    DocumentTier, KvStore, MemoryDocumentStore, StoreError, TieredPlaceStore,
};

use support::{computed, doc, draft, FailingStore, FailingTier};

fn shared_kv() -> Arc<KvStore> {
    Arc::new(KvStore::in_memory())
}

#[tokio::test]
async fn test_list_prefers_primary() {
    let primary = Arc::new(MemoryDocumentStore::new());
    primary.set(doc("p1", "Primary Peak", 10)).await.unwrap();
    let mirror = Arc::new(MemoryDocumentStore::new());
    mirror.set(doc("m1", "Mirror Mesa", 10)).await.unwrap();

    let store = TieredPlaceStore::new(primary, Some(mirror), shared_kv());
    let places = store.list().await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].id, "p1");
}

#[tokio::test]
async fn test_mirror_serves_list_and_refreshes_snapshot() {
    let kv = shared_kv();
    let mirror = Arc::new(MemoryDocumentStore::new());
    mirror.set(doc("m1", "Mirror Mesa", 20)).await.unwrap();
    mirror.set(doc("m2", "Mirror Butte", 10)).await.unwrap();

    let store = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        Some(mirror),
        kv.clone(),
    );
    let places = store.list().await.unwrap();
    assert_eq!(places.len(), 2);
    assert_eq!(places[0].id, "m1");

    // The mirror data must now back a fully-offline store.
    let offline = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        Some(Arc::new(FailingTier {
            label: "mirror offline",
        })),
        kv,
    );
    let cached = offline.list().await.unwrap();
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn test_exhausted_list_reports_primary_cause() {
    let store = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        Some(Arc::new(FailingTier {
            label: "mirror offline",
        })),
        shared_kv(),
    );

    match store.list().await {
        Err(StoreError::TiersExhausted { primary, .. }) => {
            assert!(primary.to_string().contains("primary offline"));
            assert!(!primary.to_string().contains("mirror offline"));
        }
        other => panic!("expected TiersExhausted, got {:?}", other.map(|p| p.len())),
    }
}

#[tokio::test]
async fn test_list_caches_computed_fields_from_documents() {
    let primary = Arc::new(MemoryDocumentStore::new());
    let mut scored = doc("p1", "Scored", 10);
    scored.computed = Some(computed(81, 1_000));
    primary.set(scored).await.unwrap();
    primary.set(doc("p2", "Unscored", 5)).await.unwrap();

    let store = TieredPlaceStore::new(primary, None, shared_kv());
    store.list().await.unwrap();
    assert_eq!(store.cached_computed_fields("p1").map(|f| f.score), Some(81));
    assert_eq!(store.cached_computed_fields("p2"), None);
}

#[tokio::test]
async fn test_add_and_remove_fall_back_to_mirror() {
    let mirror = Arc::new(MemoryDocumentStore::new());
    let store = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        Some(mirror.clone()),
        shared_kv(),
    );

    let place = store.add(draft("Lost Coast", 40.0, -124.0)).await.unwrap();
    assert_eq!(mirror.list().await.unwrap().len(), 1);
    assert_eq!(place.name, "Lost Coast");
    assert!(place.device_id.is_some());

    store.remove(&place.id).await.unwrap();
    assert!(mirror.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_without_network_reports_primary_error() {
    let store = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        Some(Arc::new(FailingTier {
            label: "mirror offline",
        })),
        shared_kv(),
    );

    let err = store.add(draft("Nowhere", 0.0, 0.0)).await.unwrap_err();
    assert!(err.to_string().contains("primary offline"));
}

#[tokio::test]
async fn test_write_computed_is_best_effort_and_updates_cache() {
    // Total failure: an error comes back, nothing cached.
    let offline = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        None,
        shared_kv(),
    );
    assert!(offline
        .write_computed_fields("p1", computed(50, 123))
        .await
        .is_err());
    assert_eq!(offline.cached_computed_fields("p1"), None);

    // Success path caches the fields.
    let primary = Arc::new(MemoryDocumentStore::new());
    primary.set(doc("p1", "Peak", 1)).await.unwrap();
    let online = TieredPlaceStore::new(primary, None, shared_kv());
    online
        .write_computed_fields("p1", computed(50, 123))
        .await
        .unwrap();
    assert_eq!(online.cached_computed_fields("p1").map(|f| f.score), Some(50));
}

#[tokio::test]
async fn test_read_computed_distinguishes_unscored_from_failure() {
    let primary = Arc::new(MemoryDocumentStore::new());
    primary.set(doc("p1", "Peak", 1)).await.unwrap();
    let store = TieredPlaceStore::new(primary, None, shared_kv());

    // Document exists but was never scored: a valid None, not an error.
    assert_eq!(store.read_computed_fields("p1").await.unwrap(), None);

    // All tiers down and nothing snapshotted: an error.
    let offline = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        None,
        shared_kv(),
    );
    assert!(matches!(
        offline.read_computed_fields("p1").await,
        Err(StoreError::TiersExhausted { .. })
    ));
}

#[tokio::test]
async fn test_read_computed_served_from_snapshot_when_offline() {
    let kv = shared_kv();
    let primary = Arc::new(MemoryDocumentStore::new());
    let mut scored = doc("p1", "Peak", 1);
    scored.computed = Some(computed(64, 2_000));
    primary.set(scored).await.unwrap();

    // Populate the snapshot while online.
    TieredPlaceStore::new(primary, None, kv.clone())
        .list()
        .await
        .unwrap();

    let offline = TieredPlaceStore::new(
        Arc::new(FailingStore::new("primary offline")),
        None,
        kv,
    );
    let fields = offline.read_computed_fields("p1").await.unwrap();
    assert_eq!(fields.map(|f| f.score), Some(64));
}

#[tokio::test]
async fn test_watch_reflects_primary_mutations() {
    let primary = Arc::new(MemoryDocumentStore::new());
    let store = TieredPlaceStore::new(primary.clone(), None, shared_kv());

    let mut watch = store.watch();
    primary.set(doc("p1", "Peak", 1)).await.unwrap();
    let docs = watch.changed().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].place.id, "p1");
}
