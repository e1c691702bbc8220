//! Primary-tier document API.
//!
//! The remote document store is opaque to this crate: any backend that can
//! hold one document per place (place fields plus the last computed score
//! projection) and notify on changes can serve as the primary tier.
//! [`MemoryDocumentStore`] is the in-process implementation used for local
//! development and tests.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{ComputedFields, Place};

use super::error::{StoreError, StoreResult};

/// One place document: the place itself plus its durable score projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDocument {
    pub place: Place,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<ComputedFields>,
}

/// Live subscription to the primary tier's document list.
///
/// Dropping the handle cancels the subscription.
pub struct WatchHandle {
    receiver: broadcast::Receiver<Vec<PlaceDocument>>,
}

impl WatchHandle {
    pub fn from_receiver(receiver: broadcast::Receiver<Vec<PlaceDocument>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next document-list update; `None` once the store is gone.
    /// Missed intermediate updates are skipped, not replayed.
    pub async fn changed(&mut self) -> Option<Vec<PlaceDocument>> {
        loop {
            match self.receiver.recv().await {
                Ok(docs) => return Some(docs),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Asynchronous document operations shared by the network tiers.
///
/// Implementations must be `Send + Sync`. `list` returns documents ordered
/// by `created_at_ms` descending.
#[async_trait]
pub trait DocumentTier: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<PlaceDocument>>;

    async fn get(&self, place_id: &str) -> StoreResult<Option<PlaceDocument>>;

    /// Create or replace the document for `doc.place.id`.
    async fn set(&self, doc: PlaceDocument) -> StoreResult<()>;

    /// Update only the computed-fields projection of an existing document.
    async fn update_computed(&self, place_id: &str, fields: ComputedFields) -> StoreResult<()>;

    async fn delete(&self, place_id: &str) -> StoreResult<()>;
}

/// The primary tier: a document tier that can also push live updates.
pub trait DocumentStore: DocumentTier {
    fn watch(&self) -> WatchHandle;
}

/// In-memory primary tier with broadcast-based watch.
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<String, PlaceDocument>>,
    events: broadcast::Sender<Vec<PlaceDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            docs: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn sorted_docs(&self) -> Vec<PlaceDocument> {
        let mut docs: Vec<PlaceDocument> = self.docs.read().values().cloned().collect();
        docs.sort_by_key(|d| Reverse(d.place.created_at_ms));
        docs
    }

    fn notify(&self) {
        let _ = self.events.send(self.sorted_docs());
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentTier for MemoryDocumentStore {
    async fn list(&self) -> StoreResult<Vec<PlaceDocument>> {
        Ok(self.sorted_docs())
    }

    async fn get(&self, place_id: &str) -> StoreResult<Option<PlaceDocument>> {
        Ok(self.docs.read().get(place_id).cloned())
    }

    async fn set(&self, doc: PlaceDocument) -> StoreResult<()> {
        self.docs.write().insert(doc.place.id.clone(), doc);
        self.notify();
        Ok(())
    }

    async fn update_computed(&self, place_id: &str, fields: ComputedFields) -> StoreResult<()> {
        {
            let mut docs = self.docs.write();
            let doc = docs.get_mut(place_id).ok_or_else(|| {
                StoreError::not_found(format!("no document for place {}", place_id))
                    .with_entity_id(place_id)
            })?;
            doc.computed = Some(fields);
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, place_id: &str) -> StoreResult<()> {
        self.docs.write().remove(place_id);
        self.notify();
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn watch(&self) -> WatchHandle {
        WatchHandle::from_receiver(self.events.subscribe())
    }
}
