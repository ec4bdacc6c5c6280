//! # Route Source
//!
//! Fetches routes near a coordinate from the routes API and falls back to the
//! [`RouteCache`] when the device is offline or the request fails.
//!
//! The endpoint answers `GET {base}/routesApi/routes/near?lat=..&lng=..` with a
//! GeoJSON-like feature collection wrapped in a `data` envelope:
//!
//! ```json
//! { "data": { "features": [
//!     { "properties": { "id": "12", "nombre": "Humedal", "distancia": "3.4 km", "duracion": "50 min" },
//!       "geometry": { "coordinates": [[-74.08, 4.63], [-74.07, 4.64]] } }
//! ] } }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{GpsPoint, Result, Route, RouteCache, SenderosError, SourceConfig};

// ============================================================================
// Capabilities
// ============================================================================

/// Anything that can produce the routes near a coordinate.
///
/// The map coordinator only talks to this trait, so tests can substitute a
/// scripted provider for the HTTP source.
pub trait RouteProvider: Send + Sync + 'static {
    /// Routes near (`lat`, `lng`), from the network or the cache.
    fn fetch_nearby(
        &self,
        lat: f64,
        lng: f64,
        force_refresh: bool,
    ) -> impl Future<Output = Result<Vec<Route>>> + Send;

    /// Whether the device currently has network connectivity.
    fn is_online(&self) -> bool {
        true
    }
}

/// Network reachability as reported by the platform.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity that always reports online (desktop, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Connectivity flag updated by the app shell from platform callbacks.
#[derive(Debug)]
pub struct NetworkFlag {
    online: AtomicBool,
}

impl NetworkFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Connectivity for NetworkFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

// ============================================================================
// HTTP Route Source
// ============================================================================

/// Routes API client backed by the SQLite cache.
pub struct HttpRouteSource {
    client: Client,
    config: SourceConfig,
    cache: Arc<RouteCache>,
    connectivity: Arc<dyn Connectivity>,
}

impl HttpRouteSource {
    /// Create a source that assumes the network is always reachable.
    pub fn new(config: SourceConfig, cache: Arc<RouteCache>) -> Result<Self> {
        Self::with_connectivity(config, cache, Arc::new(AlwaysOnline))
    }

    /// Create a source with a platform connectivity check.
    pub fn with_connectivity(
        config: SourceConfig,
        cache: Arc<RouteCache>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;

        Ok(Self {
            client,
            config,
            cache,
            connectivity,
        })
    }

    pub fn cache(&self) -> &RouteCache {
        &self.cache
    }

    /// Number of routes currently cached.
    pub fn cached_count(&self) -> Result<u32> {
        self.cache.count()
    }

    /// When the cache was last refreshed (epoch milliseconds).
    pub fn last_update_time(&self) -> Result<Option<i64>> {
        self.cache.last_updated()
    }

    async fn fetch_remote(&self, lat: f64, lng: f64) -> Result<Vec<Route>> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.config.nearby_url())
            .query(&[("lat", lat), ("lng", lng)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SenderosError::Server {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let routes = parse_feature_collection(&body)?;
        info!(
            "[RouteSource] Fetched {} routes near ({:.5}, {:.5}) in {} ms",
            routes.len(),
            lat,
            lng,
            start.elapsed().as_millis()
        );
        Ok(routes)
    }

    /// Cached routes in place of `err`, or `err` when the cache is empty.
    fn fallback_to_cache(&self, err: SenderosError) -> Result<Vec<Route>> {
        match self.cache.get_all() {
            Ok(cached) if !cached.is_empty() => {
                info!(
                    "[RouteSource] Serving {} cached routes after error: {}",
                    cached.len(),
                    err
                );
                Ok(cached)
            }
            Ok(_) => Err(err),
            Err(cache_err) => {
                warn!("[RouteSource] Cache read failed: {}", cache_err);
                Err(err)
            }
        }
    }
}

impl RouteProvider for HttpRouteSource {
    async fn fetch_nearby(&self, lat: f64, lng: f64, force_refresh: bool) -> Result<Vec<Route>> {
        debug!(
            "[RouteSource] fetch_nearby({:.5}, {:.5}, force_refresh={})",
            lat, lng, force_refresh
        );

        if !self.connectivity.is_online() {
            let cached = self.cache.get_all()?;
            if cached.is_empty() {
                warn!("[RouteSource] Offline with an empty cache");
                return Err(SenderosError::Offline);
            }
            info!("[RouteSource] Offline, serving {} cached routes", cached.len());
            return Ok(cached);
        }

        match self.fetch_remote(lat, lng).await {
            Ok(routes) => {
                if !routes.is_empty() {
                    if let Err(e) = self.cache.replace_all(&routes) {
                        warn!("[RouteSource] Failed to refresh cache: {}", e);
                    }
                }
                Ok(routes)
            }
            Err(e) => {
                warn!("[RouteSource] Fetch failed: {}", e);
                self.fallback_to_cache(e)
            }
        }
    }

    fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }
}

// ============================================================================
// Feature Collection Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    data: ApiFeatureCollection,
}

#[derive(Debug, Deserialize)]
struct ApiFeatureCollection {
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiFeature {
    properties: ApiProperties,
    geometry: ApiGeometry,
}

#[derive(Debug, Deserialize)]
struct ApiProperties {
    id: ApiScalar,
    nombre: ApiScalar,
    distancia: ApiScalar,
    #[serde(default)]
    duracion: Option<ApiScalar>,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// The API is loose about strings vs numbers in `properties`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiScalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl ApiScalar {
    fn into_string(self) -> String {
        match self {
            ApiScalar::Text(s) => s,
            ApiScalar::Number(n) => n.to_string(),
            ApiScalar::Bool(b) => b.to_string(),
        }
    }
}

impl ApiFeature {
    fn into_route(self) -> std::result::Result<Route, String> {
        let path = self
            .geometry
            .coordinates
            .iter()
            .map(|c| match c.as_slice() {
                [lon, lat, ..] => {
                    let point = GpsPoint::new(*lat, *lon);
                    if point.is_valid() {
                        Ok(point)
                    } else {
                        Err(format!("coordinate out of range: [{}, {}]", lon, lat))
                    }
                }
                _ => Err(format!("coordinate with {} members", c.len())),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let properties = self.properties;
        let id = properties.id.into_string();
        let distance_km = parse_distance_km(&properties.distancia.into_string());
        let description = properties.duracion.map(ApiScalar::into_string);

        Route::from_path(
            id.clone(),
            properties.nombre.into_string(),
            distance_km,
            description,
            path,
        )
        .ok_or_else(|| format!("route {} has no coordinates", id))
    }
}

/// Parse a routes API response body.
///
/// A body that is not a `{ data: { features: [...] } }` document is a
/// [`SenderosError::Parse`]. Individual malformed features are skipped with a
/// warning so one bad record does not hide the rest.
pub fn parse_feature_collection(body: &str) -> Result<Vec<Route>> {
    let envelope: ApiEnvelope =
        serde_json::from_str(body).map_err(|e| SenderosError::Parse(e.to_string()))?;

    let total = envelope.data.features.len();
    let routes: Vec<Route> = envelope
        .data
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let parsed = serde_json::from_value::<ApiFeature>(value)
                .map_err(|e| e.to_string())
                .and_then(ApiFeature::into_route);
            match parsed {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!("[RouteSource] Skipping feature {}: {}", i, e);
                    None
                }
            }
        })
        .collect();

    if routes.len() < total {
        warn!(
            "[RouteSource] Parsed {}/{} features",
            routes.len(),
            total
        );
    }
    Ok(routes)
}

/// Parse a `"<number> km"` distance. Anything unparseable is 0.0.
///
/// ```
/// use senderos::parse_distance_km;
/// assert_eq!(parse_distance_km("12.5 km"), 12.5);
/// assert_eq!(parse_distance_km("lejos"), 0.0);
/// ```
pub fn parse_distance_km(raw: &str) -> f64 {
    raw.replace(" km", "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0)
}
