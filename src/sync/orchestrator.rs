//! The sync orchestrator.
//!
//! A single owner task holds every piece of mutable state: the place list,
//! the per-place sky states, the distance cache and the in-flight set.
//! Callers drive it through [`SyncHandle`] commands; background fetches run
//! as spawned tasks and marshal their results back as messages, so no state
//! is ever mutated off the owner task. Completions that arrive after
//! shutdown land on a closed channel and are discarded.
//!
//! Per place the state machine is Absent -> Fetching -> Cached(fresh),
//! decaying to Cached(stale) after the 30-minute freshness window. A stale
//! or absent visible place triggers a background fetch; a failed fetch
//! leaves the previous cached state untouched and surfaces a non-fatal
//! error event.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::api::{Filter, Sort, UiPlace};
use crate::forecast::{FetchError, ForecastFetcher};
use crate::models::{
    haversine_km, resolve_night_window, ComputedFields, GeoPoint, HourSample, HourlySample,
    NightSettings, Place, PlaceSkyState,
};
use crate::scoring::{
    build_timeline, find_best_window, to_status, ScoringError, Weights,
};
use crate::store::{StoreError, TieredPlaceStore};

use super::persist::{SkySnapshot, SyncPrefs};
use super::view;

/// Number of bars in the compact cloud-cover timeline.
pub const TIMELINE_SEGMENTS: usize = 8;

/// Non-fatal failures surfaced to the listener.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Notifications emitted by the orchestrator.
#[derive(Debug)]
pub enum SyncEvent {
    /// The filtered, sorted projection changed.
    PlacesUpdated(Vec<UiPlace>),
    /// A reload started or finished.
    LoadingChanged(bool),
    /// A non-fatal failure; previously shown data remains valid.
    Error(SyncError),
}

enum Command {
    Reload {
        done: Option<oneshot::Sender<()>>,
    },
    VisibleRangeChanged {
        first: usize,
        last: usize,
    },
    RefreshVisible {
        force: bool,
    },
    SetFilter(Filter),
    SetSort(Sort),
    SetPrimaryPlace(Option<String>),
    SetDeviceLocation(Option<GeoPoint>),
    UpdateNightSettings(NightSettings),
    PlaceRemoved {
        place_id: String,
    },
    FetchDone {
        place_id: String,
        outcome: Result<PlaceSkyState, SyncError>,
    },
    GetSkyState {
        place_id: String,
        reply: oneshot::Sender<Option<PlaceSkyState>>,
    },
    GetNightSettings {
        reply: oneshot::Sender<NightSettings>,
    },
    Shutdown,
}

/// Handle to a running orchestrator. Cheap to clone; dropping every handle
/// (or calling [`SyncHandle::shutdown`]) stops the owner task and abandons
/// pending background work.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SyncHandle {
    /// Start the owner task. Durable preferences (night settings, filter,
    /// sort, primary place) are loaded here, once.
    pub fn spawn(
        store: Arc<TieredPlaceStore>,
        fetcher: Arc<dyn ForecastFetcher>,
        prefs: SyncPrefs,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = OwnerState {
            store,
            fetcher,
            night_settings: prefs.night_settings(),
            filter: prefs.filter(),
            sort: prefs.sort(),
            primary_place: prefs.primary_place(),
            prefs,
            events,
            // Weak, so the owner task does not keep its own channel alive
            // once every handle is gone.
            tx: tx.downgrade(),
            places: Vec::new(),
            sky_states: HashMap::new(),
            distances: HashMap::new(),
            in_flight: HashSet::new(),
            device_location: None,
            loading: false,
            last_ui: Vec::new(),
            visible_start: 0,
            visible_end: 0,
        };
        tokio::spawn(run(state, rx));
        Self { tx }
    }

    pub fn reload(&self) {
        let _ = self.tx.send(Command::Reload { done: None });
    }

    /// Reload and wait for the pass (list, hydrate, schedule) to finish.
    /// Background fetches it kicked off may still be running.
    pub async fn reload_and_wait(&self) {
        let (done, ack) = oneshot::channel();
        if self.tx.send(Command::Reload { done: Some(done) }).is_ok() {
            let _ = ack.await;
        }
    }

    pub fn on_visible_range_changed(&self, first: usize, last: usize) {
        let _ = self.tx.send(Command::VisibleRangeChanged { first, last });
    }

    pub fn refresh_visible(&self, force: bool) {
        let _ = self.tx.send(Command::RefreshVisible { force });
    }

    pub fn set_filter(&self, filter: Filter) {
        let _ = self.tx.send(Command::SetFilter(filter));
    }

    pub fn set_sort(&self, sort: Sort) {
        let _ = self.tx.send(Command::SetSort(sort));
    }

    pub fn set_primary_place(&self, place_id: Option<String>) {
        let _ = self.tx.send(Command::SetPrimaryPlace(place_id));
    }

    pub fn set_device_location(&self, location: Option<GeoPoint>) {
        let _ = self.tx.send(Command::SetDeviceLocation(location));
    }

    pub fn update_night_settings(&self, settings: NightSettings) {
        let _ = self.tx.send(Command::UpdateNightSettings(settings));
    }

    /// Tell the orchestrator a place was deleted so its cached state and
    /// local snapshot are dropped.
    pub fn place_removed(&self, place_id: impl Into<String>) {
        let _ = self.tx.send(Command::PlaceRemoved {
            place_id: place_id.into(),
        });
    }

    pub async fn sky_state(&self, place_id: impl Into<String>) -> Option<PlaceSkyState> {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::GetSkyState {
                place_id: place_id.into(),
                reply,
            })
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn night_settings(&self) -> NightSettings {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::GetNightSettings { reply }).is_err() {
            return NightSettings::default();
        }
        rx.await.unwrap_or_default()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

struct OwnerState {
    store: Arc<TieredPlaceStore>,
    fetcher: Arc<dyn ForecastFetcher>,
    prefs: SyncPrefs,
    events: mpsc::UnboundedSender<SyncEvent>,
    tx: mpsc::WeakUnboundedSender<Command>,

    places: Vec<Place>,
    sky_states: HashMap<String, PlaceSkyState>,
    distances: HashMap<String, f64>,
    in_flight: HashSet<String>,

    night_settings: NightSettings,
    filter: Filter,
    sort: Sort,
    primary_place: Option<String>,
    device_location: Option<GeoPoint>,
    loading: bool,
    last_ui: Vec<UiPlace>,
    visible_start: usize,
    visible_end: usize,
}

async fn run(mut state: OwnerState, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Shutdown => break,
            other => state.handle(other).await,
        }
    }
    log::debug!("sync orchestrator stopped");
}

impl OwnerState {
    async fn handle(&mut self, command: Command) {
        match command {
            Command::Reload { done } => self.reload(done).await,
            Command::VisibleRangeChanged { first, last } => {
                self.visible_start = first;
                self.visible_end = last.max(first);
                self.schedule_range_fetch(false);
            }
            Command::RefreshVisible { force } => self.schedule_range_fetch(force),
            Command::SetFilter(filter) => {
                if self.filter != filter {
                    self.filter = filter;
                    self.prefs.save_filter(filter);
                    self.emit_ui();
                }
            }
            Command::SetSort(sort) => {
                if self.sort != sort {
                    self.sort = sort;
                    self.prefs.save_sort(sort);
                    self.emit_ui();
                }
            }
            Command::SetPrimaryPlace(place_id) => self.set_primary_place(place_id),
            Command::SetDeviceLocation(location) => {
                self.device_location = location;
                self.compute_distances();
                self.emit_ui();
            }
            Command::UpdateNightSettings(settings) => {
                self.night_settings = settings;
                self.prefs.save_night_settings(&self.night_settings);
                self.schedule_range_fetch(true);
            }
            Command::PlaceRemoved { place_id } => {
                self.sky_states.remove(&place_id);
                self.distances.remove(&place_id);
                self.prefs.clear_sky_snapshot(&place_id);
                if self.primary_place.as_deref() == Some(place_id.as_str()) {
                    self.set_primary_place(None);
                } else {
                    self.emit_ui();
                }
            }
            Command::FetchDone { place_id, outcome } => {
                self.in_flight.remove(&place_id);
                match outcome {
                    Ok(state) => {
                        self.sky_states.insert(place_id, state);
                        self.emit_ui();
                    }
                    Err(err) => self.emit_error(err),
                }
            }
            Command::GetSkyState { place_id, reply } => {
                let _ = reply.send(self.sky_states.get(&place_id).cloned());
            }
            Command::GetNightSettings { reply } => {
                let _ = reply.send(self.night_settings.clone());
            }
            Command::Shutdown => {}
        }
    }

    async fn reload(&mut self, done: Option<oneshot::Sender<()>>) {
        self.set_loading(true);
        let result = self.store.list().await;
        self.set_loading(false);
        match result {
            Ok(items) => {
                self.places = items;
                self.hydrate_missing().await;
                self.compute_distances();
                self.emit_ui();
                self.schedule_range_fetch(false);
            }
            Err(err) => self.emit_error(err.into()),
        }
        if let Some(done) = done {
            let _ = done.send(());
        }
    }

    /// Build sky states for places that have none yet, from the durable
    /// computed fields (cache, then tiered read) or the local snapshot.
    async fn hydrate_missing(&mut self) {
        let missing: Vec<Place> = self
            .places
            .iter()
            .filter(|p| !self.sky_states.contains_key(&p.id))
            .cloned()
            .collect();
        for place in missing {
            if let Some(state) = self.hydrate_place(&place).await {
                self.sky_states.insert(place.id.clone(), state);
            }
        }
    }

    async fn hydrate_place(&self, place: &Place) -> Option<PlaceSkyState> {
        let fields = match self.store.cached_computed_fields(&place.id) {
            Some(fields) => Some(fields),
            None => match self.store.read_computed_fields(&place.id).await {
                Ok(fields) => fields,
                Err(err) => {
                    log::debug!("computed-fields hydrate failed for {}: {}", place.id, err);
                    None
                }
            },
        };
        match fields.filter(|f| f.is_valid()) {
            Some(fields) => Some(self.compose_state(&place.id, fields)),
            None => self
                .prefs
                .sky_snapshot(&place.id)
                .map(|snapshot| snapshot.into_state(true)),
        }
    }

    /// Merge durable computed fields with whatever snapshot detail survives
    /// locally; missing detail degrades to flat placeholders.
    fn compose_state(&self, place_id: &str, fields: ComputedFields) -> PlaceSkyState {
        let snapshot = self.prefs.sky_snapshot(place_id);
        let cloud_pct = (100 - i64::from(fields.clear_pct)).clamp(0, 100) as u8;
        let timeline = snapshot
            .as_ref()
            .map(|s| s.timeline.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| vec![cloud_pct; TIMELINE_SEGMENTS]);
        let hours = snapshot
            .as_ref()
            .map(|s| s.hours.clone())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| {
                vec![HourSample {
                    timestamp_ms: fields.window_start_ms,
                    cloud_pct,
                    precipitation_mm: 0.0,
                    wind_speed_ms: 0.0,
                }]
            });
        PlaceSkyState {
            score: fields.score.clamp(0, 100),
            status: to_status(fields.score as f64),
            window_start_ms: fields.window_start_ms,
            window_end_ms: fields.window_end_ms,
            clear_pct: fields.clear_pct,
            moon_pct: fields.moon_pct,
            updated_at_ms: fields.updated_at_ms,
            from_cache: true,
            timeline,
            avg_cloud: snapshot
                .as_ref()
                .map(|s| s.avg_cloud)
                .unwrap_or(f64::from(cloud_pct)),
            avg_wind: snapshot.as_ref().map(|s| s.avg_wind).unwrap_or(0.0),
            precip_free: snapshot.as_ref().map(|s| s.precip_free).unwrap_or(true),
            timezone: snapshot
                .as_ref()
                .and_then(|s| s.timezone.parse().ok())
                .unwrap_or(chrono_tz::UTC),
            hours,
        }
    }

    fn set_primary_place(&mut self, place_id: Option<String>) {
        if self.primary_place == place_id {
            return;
        }
        self.primary_place = place_id;
        self.prefs.save_primary_place(self.primary_place.as_deref());
        self.emit_ui();
    }

    fn schedule_range_fetch(&mut self, force: bool) {
        if self.last_ui.is_empty() {
            return;
        }
        let start = self.visible_start.min(self.last_ui.len() - 1);
        let end = self.visible_end.clamp(start, self.last_ui.len() - 1);
        let targets: Vec<Place> = self.last_ui[start..=end]
            .iter()
            .map(|ui| ui.place.clone())
            .collect();
        for place in targets {
            self.request_fetch(place, force);
        }
    }

    fn request_fetch(&mut self, place: Place, force: bool) {
        if !force {
            let now_ms = Utc::now().timestamp_millis();
            if let Some(current) = self.sky_states.get(&place.id) {
                if current.is_fresh(now_ms) {
                    return;
                }
            }
        }
        // At most one concurrent fetch per place id.
        if !self.in_flight.insert(place.id.clone()) {
            return;
        }

        let fetcher = self.fetcher.clone();
        let store = self.store.clone();
        let prefs = self.prefs.clone();
        let settings = self.night_settings.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = perform_fetch(fetcher, store, prefs, settings, &place).await;
            // A dead channel means the orchestrator shut down; the result
            // is dropped rather than applied.
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::FetchDone {
                    place_id: place.id,
                    outcome,
                });
            }
        });
    }

    fn compute_distances(&mut self) {
        let Some(origin) = self.device_location else {
            self.distances.clear();
            return;
        };
        for place in &self.places {
            self.distances.insert(
                place.id.clone(),
                haversine_km(origin.lat, origin.lon, place.lat, place.lon),
            );
        }
    }

    fn emit_ui(&mut self) {
        let models = view::project(
            &self.places,
            &self.sky_states,
            &self.distances,
            self.primary_place.as_deref(),
            self.filter,
            self.sort,
        );
        self.last_ui = models.clone();
        let _ = self.events.send(SyncEvent::PlacesUpdated(models));
    }

    fn emit_error(&self, err: SyncError) {
        log::warn!("sync error: {}", err);
        let _ = self.events.send(SyncEvent::Error(err));
    }

    fn set_loading(&mut self, next: bool) {
        if self.loading == next {
            return;
        }
        self.loading = next;
        let _ = self.events.send(SyncEvent::LoadingChanged(next));
    }
}

async fn perform_fetch(
    fetcher: Arc<dyn ForecastFetcher>,
    store: Arc<TieredPlaceStore>,
    prefs: SyncPrefs,
    settings: NightSettings,
    place: &Place,
) -> Result<PlaceSkyState, SyncError> {
    let bundle = fetcher.fetch(place.lat, place.lon).await?;

    let now_ms = Utc::now().timestamp_millis();
    let (window_start, window_end) = resolve_night_window(bundle.timezone, now_ms, &settings);
    let hours: Vec<HourlySample> = bundle
        .hours
        .iter()
        .filter(|h| h.timestamp_ms >= window_start && h.timestamp_ms < window_end)
        .cloned()
        .collect();
    if hours.is_empty() {
        return Err(ScoringError::NoHoursInWindow.into());
    }

    let weights = Weights {
        cloud: settings.weight_cloud,
        precip: settings.weight_precip,
        wind: settings.weight_wind,
        moon: settings.weight_moon,
    };
    let best = find_best_window(&hours, &bundle.moon_pct_by_day, &weights, settings.wind_cap_ms)
        .ok_or(ScoringError::NoWindowFound)?;

    let state = PlaceSkyState {
        score: (best.score.round() as i64).clamp(0, 100),
        status: best.status,
        window_start_ms: best.window_start_ms,
        window_end_ms: best.window_end_ms,
        clear_pct: best.clear_pct,
        moon_pct: best.moon_pct,
        updated_at_ms: now_ms,
        from_cache: false,
        timeline: build_timeline(&hours, TIMELINE_SEGMENTS),
        hours: hours
            .iter()
            .map(|h| HourSample {
                timestamp_ms: h.timestamp_ms,
                cloud_pct: (h.cloud_cover_pct.round() as i64).clamp(0, 100) as u8,
                precipitation_mm: h.precipitation_mm,
                wind_speed_ms: h.wind_speed_ms,
            })
            .collect(),
        avg_cloud: best.avg_cloud,
        avg_wind: best.avg_wind,
        precip_free: best.precip_free,
        timezone: bundle.timezone,
    };

    prefs.save_sky_snapshot(&place.id, &SkySnapshot::from_state(&state));

    // Fire-and-forget: the computed-fields push must never fail the refresh.
    let fields = state.computed_fields();
    let place_id = place.id.clone();
    tokio::spawn(async move {
        if let Err(err) = store.write_computed_fields(&place_id, fields).await {
            log::debug!("computed-fields push failed for {}: {}", place_id, err);
        }
    });

    Ok(state)
}
