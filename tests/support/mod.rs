//! Shared fixtures for the integration suites.
#![allow(dead_code)] // not every suite uses every fixture

use async_trait::async_trait;
use tokio::sync::broadcast;

use skyscout_rust::models::{ComputedFields, Place, PlaceDraft};
use skyscout_rust::store::{
    DocumentStore, DocumentTier, PlaceDocument, StoreError, StoreResult, WatchHandle,
};

pub fn draft(name: &str, lat: f64, lon: f64) -> PlaceDraft {
    PlaceDraft {
        name: name.to_string(),
        lat,
        lon,
        bortle: None,
        notes: None,
    }
}

pub fn place(id: &str, name: &str, created_at_ms: i64) -> Place {
    Place {
        id: id.to_string(),
        name: name.to_string(),
        lat: 37.7739,
        lon: -122.4313,
        bortle: None,
        notes: None,
        created_at_ms,
        device_id: None,
    }
}

pub fn doc(id: &str, name: &str, created_at_ms: i64) -> PlaceDocument {
    PlaceDocument {
        place: place(id, name, created_at_ms),
        computed: None,
    }
}

pub fn computed(score: i64, updated_at_ms: i64) -> ComputedFields {
    ComputedFields {
        score,
        window_start_ms: updated_at_ms,
        window_end_ms: updated_at_ms + 3_600_000,
        clear_pct: 75,
        moon_pct: 10,
        updated_at_ms,
    }
}

/// A tier that fails every call with a connection error carrying `label`.
pub struct FailingTier {
    pub label: &'static str,
}

impl FailingTier {
    fn err(&self) -> StoreError {
        StoreError::connection(self.label)
    }
}

#[async_trait]
impl DocumentTier for FailingTier {
    async fn list(&self) -> StoreResult<Vec<PlaceDocument>> {
        Err(self.err())
    }

    async fn get(&self, _place_id: &str) -> StoreResult<Option<PlaceDocument>> {
        Err(self.err())
    }

    async fn set(&self, _doc: PlaceDocument) -> StoreResult<()> {
        Err(self.err())
    }

    async fn update_computed(
        &self,
        _place_id: &str,
        _fields: ComputedFields,
    ) -> StoreResult<()> {
        Err(self.err())
    }

    async fn delete(&self, _place_id: &str) -> StoreResult<()> {
        Err(self.err())
    }
}

/// A primary tier that is always offline.
pub struct FailingStore {
    tier: FailingTier,
    events: broadcast::Sender<Vec<PlaceDocument>>,
}

impl FailingStore {
    pub fn new(label: &'static str) -> Self {
        let (events, _) = broadcast::channel(4);
        Self {
            tier: FailingTier { label },
            events,
        }
    }
}

#[async_trait]
impl DocumentTier for FailingStore {
    async fn list(&self) -> StoreResult<Vec<PlaceDocument>> {
        self.tier.list().await
    }

    async fn get(&self, place_id: &str) -> StoreResult<Option<PlaceDocument>> {
        self.tier.get(place_id).await
    }

    async fn set(&self, doc: PlaceDocument) -> StoreResult<()> {
        self.tier.set(doc).await
    }

    async fn update_computed(&self, place_id: &str, fields: ComputedFields) -> StoreResult<()> {
        self.tier.update_computed(place_id, fields).await
    }

    async fn delete(&self, place_id: &str) -> StoreResult<()> {
        self.tier.delete(place_id).await
    }
}

impl DocumentStore for FailingStore {
    fn watch(&self) -> WatchHandle {
        WatchHandle::from_receiver(self.events.subscribe())
    }
}
