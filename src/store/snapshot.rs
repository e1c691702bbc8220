//! Tier 3: the on-device snapshot of the place list.
//!
//! Holds the documents from the last successful network list so the place
//! list survives a full outage. Never authoritative for writes.

use std::sync::Arc;

use super::document::PlaceDocument;
use super::kv::KvStore;

const SNAPSHOT_KEY: &str = "places_snapshot";

#[derive(Clone)]
pub struct SnapshotStore {
    kv: Arc<KvStore>,
}

impl SnapshotStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    pub fn save(&self, docs: &[PlaceDocument]) {
        if let Err(err) = self.kv.put(SNAPSHOT_KEY, &docs) {
            log::warn!("failed to persist place snapshot: {}", err);
        }
    }

    pub fn load(&self) -> Vec<PlaceDocument> {
        self.kv.get(SNAPSHOT_KEY).unwrap_or_default()
    }

    pub fn find(&self, place_id: &str) -> Option<PlaceDocument> {
        self.load().into_iter().find(|d| d.place.id == place_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Place;

    fn doc(id: &str) -> PlaceDocument {
        PlaceDocument {
            place: Place {
                id: id.into(),
                name: id.into(),
                lat: 0.0,
                lon: 0.0,
                bortle: None,
                notes: None,
                created_at_ms: 1,
                device_id: None,
            },
            computed: None,
        }
    }

    #[test]
    fn test_save_load_find() {
        let store = SnapshotStore::new(Arc::new(KvStore::in_memory()));
        assert!(store.load().is_empty());
        store.save(&[doc("a"), doc("b")]);
        assert_eq!(store.load().len(), 2);
        assert_eq!(store.find("b").unwrap().place.id, "b");
        assert!(store.find("c").is_none());
    }
}
