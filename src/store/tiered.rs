//! The tiered place store.
//!
//! Three ordered tiers serve every read: the primary document store, the
//! REST mirror, and the on-device snapshot. Reads take the first tier that
//! succeeds; a network success overwrites the snapshot; exhausting every
//! tier reports the primary tier's original failure so root-cause
//! diagnostics survive the fallback chain. Mutations never touch the
//! snapshot. Computed-fields writes are best-effort.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::{ComputedFields, Place, PlaceDraft};

use super::document::{DocumentStore, DocumentTier, PlaceDocument, WatchHandle};
use super::error::{StoreError, StoreResult};
use super::kv::KvStore;
use super::snapshot::SnapshotStore;

const PRIMARY_TIER: &str = "primary";
const MIRROR_TIER: &str = "mirror";

/// Runs ordered async attempts until one succeeds.
///
/// Returns the succeeding tier's name with its value, or every failure in
/// attempt order. Collapses the nested per-tier error handling into one
/// place; callers decide what an all-tiers failure means.
pub(crate) async fn first_success<'a, T>(
    attempts: Vec<(&'static str, BoxFuture<'a, StoreResult<T>>)>,
) -> Result<(&'static str, T), Vec<(&'static str, StoreError)>> {
    let mut failures = Vec::new();
    for (tier, attempt) in attempts {
        match attempt.await {
            Ok(value) => return Ok((tier, value)),
            Err(err) => {
                log::warn!("{} tier failed: {}", tier, err);
                failures.push((tier, err));
            }
        }
    }
    Err(failures)
}

/// Facade over the three place-data tiers.
pub struct TieredPlaceStore {
    primary: Arc<dyn DocumentStore>,
    mirror: Option<Arc<dyn DocumentTier>>,
    snapshot: SnapshotStore,
    device_id: String,
    /// Latest known computed fields per place. Externally synchronized so
    /// other components may read it concurrently; entries are independent.
    computed_cache: RwLock<HashMap<String, ComputedFields>>,
}

impl TieredPlaceStore {
    pub fn new(
        primary: Arc<dyn DocumentStore>,
        mirror: Option<Arc<dyn DocumentTier>>,
        kv: Arc<KvStore>,
    ) -> Self {
        let device_id = kv.device_id();
        Self {
            primary,
            mirror,
            snapshot: SnapshotStore::new(kv),
            device_id,
            computed_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The place list from the first tier that has one.
    ///
    /// On an all-tiers failure with no usable snapshot the returned error is
    /// [`StoreError::TiersExhausted`] carrying the primary failure; callers
    /// must inspect it rather than treating an empty list as "no data".
    pub async fn list(&self) -> StoreResult<Vec<Place>> {
        match first_success(self.read_attempts(|tier| tier.list())).await {
            Ok((tier, docs)) => {
                // Only the primary tier may persist an empty list.
                if tier == PRIMARY_TIER || !docs.is_empty() {
                    self.snapshot.save(&docs);
                }
                self.cache_documents(&docs);
                log::debug!("listed {} places via {} tier", docs.len(), tier);
                Ok(docs.into_iter().map(|d| d.place).collect())
            }
            Err(failures) => {
                let cached = self.snapshot.load();
                if !cached.is_empty() {
                    log::info!("all network tiers failed, serving {} places from snapshot", cached.len());
                    self.cache_documents(&cached);
                    return Ok(cached.into_iter().map(|d| d.place).collect());
                }
                Err(Self::exhausted(failures).with_operation("list"))
            }
        }
    }

    /// Create a place. Mutations require a network tier.
    pub async fn add(&self, draft: PlaceDraft) -> StoreResult<Place> {
        let place = Place {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            lat: draft.lat,
            lon: draft.lon,
            bortle: draft.bortle,
            notes: draft
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at_ms: Utc::now().timestamp_millis(),
            device_id: Some(self.device_id.clone()),
        };
        let doc = PlaceDocument {
            place: place.clone(),
            computed: None,
        };

        match self.primary.set(doc.clone()).await {
            Ok(()) => Ok(place),
            Err(primary_err) => match &self.mirror {
                Some(mirror) => match mirror.set(doc).await {
                    Ok(()) => Ok(place),
                    Err(_) => Err(primary_err
                        .with_operation("add")
                        .with_entity_id(&place.id)),
                },
                None => Err(primary_err.with_operation("add").with_entity_id(&place.id)),
            },
        }
    }

    /// Delete a place. Mutations require a network tier.
    pub async fn remove(&self, place_id: &str) -> StoreResult<()> {
        let result = match self.primary.delete(place_id).await {
            Ok(()) => Ok(()),
            Err(primary_err) => match &self.mirror {
                Some(mirror) => match mirror.delete(place_id).await {
                    Ok(()) => Ok(()),
                    Err(_) => Err(primary_err),
                },
                None => Err(primary_err),
            },
        };
        match result {
            Ok(()) => {
                self.computed_cache.write().remove(place_id);
                Ok(())
            }
            Err(err) => Err(err.with_operation("remove").with_entity_id(place_id)),
        }
    }

    /// Push a place's computed fields upstream. Best-effort: callers fire and
    /// forget; the cache is updated here on success.
    pub async fn write_computed_fields(
        &self,
        place_id: &str,
        fields: ComputedFields,
    ) -> StoreResult<()> {
        let result = match self.primary.update_computed(place_id, fields).await {
            Ok(()) => Ok(()),
            Err(primary_err) => match &self.mirror {
                Some(mirror) => match mirror.update_computed(place_id, fields).await {
                    Ok(()) => Ok(()),
                    Err(_) => Err(primary_err),
                },
                None => Err(primary_err),
            },
        };
        match result {
            Ok(()) => {
                self.cache_computed(place_id, Some(fields));
                Ok(())
            }
            Err(err) => Err(err
                .with_operation("write_computed_fields")
                .with_entity_id(place_id)),
        }
    }

    /// Read a place's computed fields through the tiers.
    ///
    /// `Ok(None)` means the place exists but has never been scored; that is
    /// a valid state, distinct from a fetch error.
    pub async fn read_computed_fields<'a>(
        &'a self,
        place_id: &'a str,
    ) -> StoreResult<Option<ComputedFields>> {
        match first_success(self.read_attempts(|tier| tier.get(place_id))).await {
            Ok((_, doc)) => {
                let computed = doc.and_then(|d| d.computed).filter(ComputedFields::is_valid);
                self.cache_computed(place_id, computed);
                Ok(computed)
            }
            Err(failures) => match self.snapshot.find(place_id) {
                Some(doc) => Ok(doc.computed.filter(ComputedFields::is_valid)),
                None => Err(Self::exhausted(failures)
                    .with_operation("read_computed_fields")
                    .with_entity_id(place_id)),
            },
        }
    }

    /// Live place-list subscription (primary tier only).
    pub fn watch(&self) -> WatchHandle {
        self.primary.watch()
    }

    /// Latest known computed fields for a place, safe to call from any
    /// thread.
    pub fn cached_computed_fields(&self, place_id: &str) -> Option<ComputedFields> {
        self.computed_cache.read().get(place_id).copied()
    }

    fn read_attempts<'a, T, F>(&'a self, mut call: F) -> Vec<(&'static str, BoxFuture<'a, StoreResult<T>>)>
    where
        F: FnMut(&'a dyn DocumentTier) -> BoxFuture<'a, StoreResult<T>>,
    {
        let primary: &dyn DocumentTier = self.primary.as_ref();
        let mut attempts = vec![(PRIMARY_TIER, call(primary))];
        if let Some(mirror) = &self.mirror {
            attempts.push((MIRROR_TIER, call(mirror.as_ref())));
        }
        attempts
    }

    fn exhausted(mut failures: Vec<(&'static str, StoreError)>) -> StoreError {
        // The first attempt is always the primary tier.
        if failures.is_empty() {
            return StoreError::tiers_exhausted(StoreError::connection("no tiers attempted"));
        }
        StoreError::tiers_exhausted(failures.remove(0).1)
    }

    fn cache_documents(&self, docs: &[PlaceDocument]) {
        for doc in docs {
            self.cache_computed(&doc.place.id, doc.computed.filter(ComputedFields::is_valid));
        }
    }

    fn cache_computed(&self, place_id: &str, fields: Option<ComputedFields>) {
        let mut cache = self.computed_cache.write();
        match fields {
            Some(fields) => {
                cache.insert(place_id.to_string(), fields);
            }
            None => {
                cache.remove(place_id);
            }
        }
    }
}
