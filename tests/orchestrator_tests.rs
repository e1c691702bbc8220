//! End-to-end behavior of the sync orchestrator.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;

use skyscout_rust::api::UiPlace;
use skyscout_rust::forecast::{FetchError, ForecastFetcher};
use skyscout_rust::models::{
    day_key, resolve_night_window, ForecastBundle, HourlySample, MoonTable, NightSettings,
};
use skyscout_rust::store::{KvStore, MemoryDocumentStore, TieredPlaceStore};
use skyscout_rust::sync::{SyncEvent, SyncHandle, SyncPrefs};
use skyscout_rust::SkyStatus;

use support::{computed, draft};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves the same synthetic night for every request: hourly samples laid
/// out from tonight's window start, calm wind, no precipitation.
struct ScriptedFetcher {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    clouds: Vec<f64>,
    fail: bool,
}

impl ScriptedFetcher {
    fn new(clouds: Vec<f64>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: None,
            clouds,
            fail: false,
        }
    }

    fn gated(clouds: Vec<f64>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(clouds)
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastFetcher for ScriptedFetcher {
    async fn fetch(&self, _lat: f64, _lon: f64) -> Result<ForecastBundle, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if self.fail {
            return Err(FetchError::Network("scripted outage".into()));
        }

        let tz = chrono_tz::UTC;
        let now_ms = Utc::now().timestamp_millis();
        let (window_start, _) = resolve_night_window(tz, now_ms, &NightSettings::default());
        let hours = self
            .clouds
            .iter()
            .enumerate()
            .map(|(i, &cloud)| {
                let timestamp_ms = window_start + i as i64 * 3_600_000;
                HourlySample {
                    timestamp_ms,
                    day_key: day_key(timestamp_ms, tz),
                    cloud_cover_pct: cloud,
                    precipitation_mm: 0.0,
                    wind_speed_ms: 3.0,
                    visibility_km: None,
                }
            })
            .collect();
        Ok(ForecastBundle {
            timezone: tz,
            hours,
            moon_pct_by_day: MoonTable::new(),
        })
    }
}

struct Harness {
    store: Arc<TieredPlaceStore>,
    fetcher: Arc<ScriptedFetcher>,
    handle: SyncHandle,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    kv: Arc<KvStore>,
}

fn start(fetcher: ScriptedFetcher) -> Harness {
    let kv = Arc::new(KvStore::in_memory());
    let store = Arc::new(TieredPlaceStore::new(
        Arc::new(MemoryDocumentStore::new()),
        None,
        kv.clone(),
    ));
    let fetcher = Arc::new(fetcher);
    let (tx, events) = mpsc::unbounded_channel();
    let handle = SyncHandle::spawn(
        store.clone(),
        fetcher.clone(),
        SyncPrefs::new(kv.clone()),
        tx,
    );
    Harness {
        store,
        fetcher,
        handle,
        events,
        kv,
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Drain events until a projection arrives whose every place carries a
/// live (non-cache) sky state.
async fn wait_for_live_projection(
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
) -> Vec<UiPlace> {
    loop {
        if let SyncEvent::PlacesUpdated(models) = next_event(events).await {
            let all_live = !models.is_empty()
                && models
                    .iter()
                    .all(|m| m.sky.as_ref().map(|s| !s.from_cache).unwrap_or(false));
            if all_live {
                return models;
            }
        }
    }
}

async fn wait_for_error(events: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    loop {
        let event = next_event(events).await;
        if matches!(event, SyncEvent::Error(_)) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_reference_night_end_to_end() {
    let clouds = vec![80.0, 60.0, 40.0, 20.0, 10.0, 15.0, 30.0, 50.0, 70.0, 90.0];
    let mut harness = start(ScriptedFetcher::new(clouds));
    harness
        .store
        .add(draft("Twin Peaks", 37.7739, -122.4313))
        .await
        .unwrap();

    harness.handle.reload_and_wait().await;
    let models = wait_for_live_projection(&mut harness.events).await;

    assert_eq!(models.len(), 1);
    let sky = models[0].sky.as_ref().unwrap();
    // 0.6*90 + 0.2*20 + 0.1*(12-3) + 0.1*100 = 68.9, rounded for display.
    assert_eq!(sky.score, 69);
    assert_eq!(sky.status, SkyStatus::Ok);
    assert_eq!(sky.clear_pct, 90);
    assert!(sky.precip_free);
    assert_eq!(sky.timeline.len(), 8);

    // The winning hour is index 4 (cloud 10) of the sliced window.
    let now_ms = Utc::now().timestamp_millis();
    let (window_start, _) =
        resolve_night_window(chrono_tz::UTC, now_ms, &NightSettings::default());
    assert_eq!(sky.window_start_ms, window_start + 4 * 3_600_000);
    assert_eq!(sky.window_end_ms, sky.window_start_ms + 3_600_000);
}

#[tokio::test]
async fn test_reload_emits_loading_transitions() {
    let mut harness = start(ScriptedFetcher::new(vec![50.0]));
    harness.handle.reload_and_wait().await;

    assert!(matches!(
        next_event(&mut harness.events).await,
        SyncEvent::LoadingChanged(true)
    ));
    assert!(matches!(
        next_event(&mut harness.events).await,
        SyncEvent::LoadingChanged(false)
    ));
}

#[tokio::test]
async fn test_fresh_state_suppresses_refetch() {
    let harness = start(ScriptedFetcher::new(vec![50.0]));
    let place = harness.store.add(draft("Fresh", 0.0, 0.0)).await.unwrap();
    let now_ms = Utc::now().timestamp_millis();
    harness
        .store
        .write_computed_fields(&place.id, computed(70, now_ms - 29 * 60 * 1000))
        .await
        .unwrap();

    harness.handle.reload_and_wait().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.fetcher.calls(), 0);

    harness.handle.refresh_visible(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_stale_state_triggers_refetch() {
    let mut harness = start(ScriptedFetcher::new(vec![50.0]));
    let place = harness.store.add(draft("Stale", 0.0, 0.0)).await.unwrap();
    let now_ms = Utc::now().timestamp_millis();
    harness
        .store
        .write_computed_fields(&place.id, computed(70, now_ms - 31 * 60 * 1000))
        .await
        .unwrap();

    harness.handle.reload_and_wait().await;
    wait_for_live_projection(&mut harness.events).await;
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_at_most_one_fetch_in_flight_per_place() {
    let gate = Arc::new(Semaphore::new(0));
    let mut harness = start(ScriptedFetcher::gated(vec![50.0], gate.clone()));
    harness.store.add(draft("Busy", 0.0, 0.0)).await.unwrap();

    harness.handle.reload_and_wait().await;
    // Two more requests for the same place while the first is stuck.
    harness.handle.on_visible_range_changed(0, 0);
    harness.handle.on_visible_range_changed(0, 0);
    harness.handle.refresh_visible(false);
    tokio::time::sleep(Duration::from_millis(100)).await;

    gate.add_permits(16);
    wait_for_live_projection(&mut harness.events).await;
    assert_eq!(harness.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_failed_fetch_keeps_cached_state() {
    let mut harness = start(ScriptedFetcher::failing());
    let place = harness.store.add(draft("Outage", 0.0, 0.0)).await.unwrap();
    let now_ms = Utc::now().timestamp_millis();
    let stale = computed(55, now_ms - 45 * 60 * 1000);
    harness
        .store
        .write_computed_fields(&place.id, stale)
        .await
        .unwrap();

    harness.handle.reload_and_wait().await;
    wait_for_error(&mut harness.events).await;

    // The stale hydrated state must survive the failed refresh untouched.
    let sky = harness.handle.sky_state(&place.id).await.unwrap();
    assert_eq!(sky.score, 55);
    assert_eq!(sky.updated_at_ms, stale.updated_at_ms);
    assert!(sky.from_cache);
    assert!(harness.fetcher.calls() >= 1);
}

#[tokio::test]
async fn test_refresh_persists_snapshot_and_pushes_computed_fields() {
    let mut harness = start(ScriptedFetcher::new(vec![10.0]));
    let place = harness.store.add(draft("Push", 0.0, 0.0)).await.unwrap();

    harness.handle.reload_and_wait().await;
    wait_for_live_projection(&mut harness.events).await;

    // Local snapshot written by the fetch.
    let prefs = SyncPrefs::new(harness.kv.clone());
    let snapshot = prefs.sky_snapshot(&place.id).expect("snapshot persisted");
    assert_eq!(snapshot.clear_pct, 90);

    // Best-effort upstream push lands shortly after.
    let mut pushed = None;
    for _ in 0..50 {
        pushed = harness.store.cached_computed_fields(&place.id);
        if pushed.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(pushed.map(|f| f.clear_pct), Some(90));
}

#[tokio::test]
async fn test_place_removed_clears_local_state() {
    let mut harness = start(ScriptedFetcher::new(vec![10.0]));
    let place = harness.store.add(draft("Doomed", 0.0, 0.0)).await.unwrap();

    harness.handle.reload_and_wait().await;
    wait_for_live_projection(&mut harness.events).await;

    harness.store.remove(&place.id).await.unwrap();
    harness.handle.place_removed(place.id.clone());
    harness.handle.reload_and_wait().await;

    assert!(harness.handle.sky_state(&place.id).await.is_none());
    let prefs = SyncPrefs::new(harness.kv.clone());
    assert!(prefs.sky_snapshot(&place.id).is_none());
}

#[tokio::test]
async fn test_shutdown_discards_pending_completions() {
    let gate = Arc::new(Semaphore::new(0));
    let mut harness = start(ScriptedFetcher::gated(vec![50.0], gate.clone()));
    harness.store.add(draft("Late", 0.0, 0.0)).await.unwrap();

    harness.handle.reload_and_wait().await;
    for _ in 0..50 {
        if harness.fetcher.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(harness.fetcher.calls(), 1);

    harness.handle.shutdown();
    gate.add_permits(16);

    // The in-flight result lands on a closed channel; no projection with
    // live data may follow.
    let mut saw_live = false;
    while let Ok(Some(event)) = timeout(Duration::from_millis(300), harness.events.recv()).await {
        if let SyncEvent::PlacesUpdated(models) = event {
            if models
                .iter()
                .any(|m| m.sky.as_ref().map(|s| !s.from_cache).unwrap_or(false))
            {
                saw_live = true;
            }
        }
    }
    assert!(!saw_live);
}
