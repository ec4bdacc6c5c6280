//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes one [`MapSession`] per map screen: a [`MapCoordinator`] over the
//! HTTP route source and the on-device cache. Async work runs on a shared
//! tokio runtime; exported methods block on it, so call them off the UI
//! thread.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use once_cell::sync::Lazy;
use tokio::runtime::Runtime;

use crate::coordinator::{Interaction, LoadPhase, MapCoordinator, MapState};
use crate::poller::{LocationPoller, LocationProvider};
use crate::source::{HttpRouteSource, NetworkFlag};
use crate::{
    Bounds, GpsPoint, Result, Route, RouteCache, SenderosConfig, SenderosError, init_logging,
};

static RUNTIME: Lazy<std::result::Result<Runtime, String>> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("senderos")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

fn runtime() -> Result<&'static Runtime> {
    RUNTIME
        .as_ref()
        .map_err(|e| SenderosError::Runtime(e.clone()))
}

// ============================================================================
// Callback Interfaces
// ============================================================================

/// Platform location source. Implement in Kotlin/Swift.
#[uniffi::export(callback_interface)]
pub trait LocationCallback: Send + Sync {
    /// Last known fix, `None` while the platform has none.
    fn last_location(&self) -> Option<GpsPoint>;
}

struct CallbackLocation(Box<dyn LocationCallback>);

impl LocationProvider for CallbackLocation {
    async fn last_location(&self) -> Option<GpsPoint> {
        self.0.last_location()
    }
}

// ============================================================================
// State Record
// ============================================================================

/// Map screen state as seen from the platform.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMapState {
    pub current_location: Option<GpsPoint>,
    pub routes: Vec<Route>,
    pub filtered_routes: Vec<Route>,
    pub load_phase: LoadPhase,
    pub interaction: Interaction,
    pub is_offline: bool,
    pub error_message: Option<String>,
    pub can_retry: bool,
    pub notice: Option<String>,
    pub selected_route: Option<Route>,
    pub navigation_path: Option<Vec<GpsPoint>>,
    pub start_zone: Option<GpsPoint>,
    pub max_distance_km: Option<f64>,
    pub validation_message: Option<String>,
    pub recenter_on: Option<GpsPoint>,
    pub focus_bounds: Option<Bounds>,
}

impl From<MapState> for FfiMapState {
    fn from(state: MapState) -> Self {
        Self {
            load_phase: state.load_phase(),
            interaction: state.interaction(),
            focus_bounds: state.focus_bounds(),
            current_location: state.current_location,
            routes: state.routes,
            filtered_routes: state.filtered_routes,
            is_offline: state.is_offline,
            error_message: state.error_message,
            can_retry: state.can_retry,
            notice: state.notice,
            selected_route: state.selected_route,
            navigation_path: state.navigation_path,
            start_zone: state.start_zone,
            max_distance_km: state.max_distance_km,
            validation_message: state.validation_message,
            recenter_on: state.recenter_on,
        }
    }
}

// ============================================================================
// Map Session
// ============================================================================

#[derive(uniffi::Object)]
pub struct MapSession {
    coordinator: Arc<MapCoordinator<HttpRouteSource>>,
    network: Arc<NetworkFlag>,
    poller: Mutex<Option<LocationPoller>>,
    runtime: &'static Runtime,
}

impl MapSession {
    fn open(db_path: &str, config_json: Option<&str>) -> Result<Self> {
        let config = match config_json {
            Some(json) => SenderosConfig::from_json(json)?,
            None => SenderosConfig::default(),
        };
        let runtime = runtime()?;

        let cache = Arc::new(RouteCache::open(db_path)?);
        let network = Arc::new(NetworkFlag::new(true));
        let source = HttpRouteSource::with_connectivity(config.source, cache, network.clone())?;
        let coordinator = Arc::new(MapCoordinator::with_config(Arc::new(source), config.map));

        Ok(Self {
            coordinator,
            network,
            poller: Mutex::new(None),
            runtime,
        })
    }

    fn poller(&self) -> std::sync::MutexGuard<'_, Option<LocationPoller>> {
        self.poller.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Open a map session over the cache at `db_path`.
///
/// `config_json` overrides [`SenderosConfig`] defaults. Returns `None` (and
/// logs why) when the cache, the HTTP client or the runtime cannot be set up.
#[uniffi::export]
pub fn map_session_open(db_path: String, config_json: Option<String>) -> Option<Arc<MapSession>> {
    init_logging();
    match MapSession::open(&db_path, config_json.as_deref()) {
        Ok(session) => {
            info!("[MapSession] Opened with cache at {}", db_path);
            Some(Arc::new(session))
        }
        Err(e) => {
            warn!("[MapSession] Failed to open: {}", e);
            None
        }
    }
}

#[uniffi::export]
impl MapSession {
    pub fn state(&self) -> FfiMapState {
        self.coordinator.snapshot().into()
    }

    /// Report platform connectivity changes.
    pub fn set_online(&self, online: bool) {
        self.network.set_online(online);
    }

    /// Record a location fix; fetches routes in the background when none
    /// are loaded yet. Returns whether a fetch was started.
    pub fn update_location(&self, location: GpsPoint) -> bool {
        if !self.coordinator.update_location(location) {
            return false;
        }
        let coordinator = self.coordinator.clone();
        self.runtime.spawn(async move {
            coordinator
                .load_nearby(Some(location.latitude), Some(location.longitude), false)
                .await;
        });
        true
    }

    pub fn load_nearby(&self, lat: Option<f64>, lng: Option<f64>, force_refresh: bool) {
        self.runtime
            .block_on(self.coordinator.load_nearby(lat, lng, force_refresh));
    }

    pub fn refresh_routes(&self) {
        self.runtime.block_on(self.coordinator.refresh_routes());
    }

    pub fn set_max_distance_filter(&self, max_km: Option<f64>) {
        self.coordinator.set_max_distance_filter(max_km);
    }

    pub fn clear_filters(&self) {
        self.coordinator.clear_filters();
    }

    pub fn select_route(&self, route: Route) {
        self.coordinator.select_route(route);
    }

    pub fn select_route_at(&self, tap: GpsPoint) -> bool {
        self.coordinator.select_route_at(tap)
    }

    pub fn clear_selection(&self) {
        self.coordinator.clear_selection();
    }

    pub fn start_navigation(&self, route: Route) -> bool {
        self.coordinator.start_navigation(&route)
    }

    pub fn clear_navigation(&self) {
        self.coordinator.clear_navigation();
    }

    pub fn clear_validation_message(&self) {
        self.coordinator.clear_validation_message();
    }

    pub fn clear_error_message(&self) {
        self.coordinator.clear_error_message();
    }

    pub fn acknowledge_recenter(&self) {
        self.coordinator.acknowledge_recenter();
    }

    pub fn cached_route_count(&self) -> u32 {
        self.coordinator.source().cached_count().unwrap_or(0)
    }

    pub fn last_cache_update(&self) -> Option<i64> {
        self.coordinator
            .source()
            .last_update_time()
            .ok()
            .flatten()
    }

    /// Poll `callback` for fixes every `interval_ms` (default from config),
    /// replacing any running poll.
    pub fn start_location_polling(&self, callback: Box<dyn LocationCallback>, interval_ms: Option<u64>) {
        let period = interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.coordinator.config().poll_interval());
        let poller = LocationPoller::spawn_on(
            self.runtime.handle(),
            self.coordinator.clone(),
            Arc::new(CallbackLocation(callback)),
            period,
        );
        // Dropping the previous poller stops it.
        *self.poller() = Some(poller);
    }

    pub fn stop_location_polling(&self) {
        if let Some(poller) = self.poller().take() {
            poller.stop();
        }
    }
}
