//! Routes API client against a loopback HTTP responder.

mod common;

use std::sync::Arc;

use common::{StubServer, collection, feature, init_logging};
use senderos::{
    GpsPoint, HttpRouteSource, LoadPhase, MapCoordinator, NetworkFlag, RouteCache, RouteProvider,
    SenderosError, SourceConfig,
};

fn two_routes() -> String {
    collection(vec![
        feature("1", "Humedal Córdoba", "3.4 km", &[[-74.0795, 4.6315], [-74.0780, 4.6330]]),
        feature("2", "Cerros", "12 km", &[[-74.0500, 4.7000], [-74.0490, 4.7010], [-74.0480, 4.7020]]),
    ])
}

fn source_for(server: &StubServer, cache: Arc<RouteCache>) -> HttpRouteSource {
    HttpRouteSource::new(SourceConfig::with_base_url(server.base_url.clone()), cache).unwrap()
}

#[tokio::test]
async fn test_fetch_parses_and_caches() {
    init_logging();
    let server = StubServer::start(200, two_routes()).await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let source = source_for(&server, cache.clone());

    let routes = source.fetch_nearby(4.63, -74.08, false).await.unwrap();

    assert_eq!(routes.len(), 2);
    assert_eq!(routes[0].name, "Humedal Córdoba");
    assert_eq!(routes[0].distance_km, 3.4);
    assert_eq!(routes[0].anchor(), GpsPoint::new(4.6315, -74.0795));
    assert_eq!(routes[0].description.as_deref(), Some("40 min"));
    assert_eq!(routes[1].path.len(), 3);

    assert_eq!(cache.count().unwrap(), 2);
    assert!(source.last_update_time().unwrap().is_some());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /routesApi/routes/near?lat=4.63&lng=-74.08 "));
}

#[tokio::test]
async fn test_server_error_falls_back_to_cache() {
    let server = StubServer::start(200, two_routes()).await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let source = source_for(&server, cache);
    source.fetch_nearby(4.63, -74.08, false).await.unwrap();

    server.respond_with(500, "{}");
    let routes = source.fetch_nearby(4.63, -74.08, true).await.unwrap();
    assert_eq!(routes.len(), 2);
}

#[tokio::test]
async fn test_server_error_without_cache() {
    let server = StubServer::start(503, "").await;
    let source = source_for(&server, Arc::new(RouteCache::in_memory().unwrap()));

    let err = source.fetch_nearby(4.63, -74.08, false).await.unwrap_err();
    assert!(matches!(err, SenderosError::Server { status: 503 }));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = StubServer::start(200, "<html>maintenance</html>").await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let source = source_for(&server, cache.clone());

    let err = source.fetch_nearby(4.63, -74.08, false).await.unwrap_err();
    assert!(matches!(err, SenderosError::Parse(_)));

    server.respond_with(200, two_routes());
    source.fetch_nearby(4.63, -74.08, false).await.unwrap();
    server.respond_with(200, "not json");
    assert_eq!(source.fetch_nearby(4.63, -74.08, false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_result_keeps_cache() {
    let server = StubServer::start(200, two_routes()).await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let source = source_for(&server, cache.clone());
    source.fetch_nearby(4.63, -74.08, false).await.unwrap();

    server.respond_with(200, collection(vec![]));
    let routes = source.fetch_nearby(4.63, -74.08, false).await.unwrap();

    assert!(routes.is_empty());
    assert_eq!(cache.count().unwrap(), 2);
}

#[tokio::test]
async fn test_bad_feature_skipped() {
    let body = collection(vec![
        feature("1", "Good", "2 km", &[[-74.08, 4.63]]),
        serde_json::json!({ "properties": { "id": "2" }, "geometry": { "coordinates": [] } }),
        feature("3", "Also good", "abc", &[[-74.07, 4.64]]),
    ]);
    let server = StubServer::start(200, body).await;
    let source = source_for(&server, Arc::new(RouteCache::in_memory().unwrap()));

    let routes = source.fetch_nearby(4.63, -74.08, false).await.unwrap();
    let ids: Vec<&str> = routes.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(routes[1].distance_km, 0.0);
}

#[tokio::test]
async fn test_offline_never_hits_network() {
    let server = StubServer::start(200, two_routes()).await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let network = Arc::new(NetworkFlag::new(true));
    let source = HttpRouteSource::with_connectivity(
        SourceConfig::with_base_url(server.base_url.clone()),
        cache,
        network.clone(),
    )
    .unwrap();
    source.fetch_nearby(4.63, -74.08, false).await.unwrap();

    network.set_online(false);
    let routes = source.fetch_nearby(4.63, -74.08, true).await.unwrap();

    assert_eq!(routes.len(), 2);
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_coordinator_over_http_source() {
    init_logging();
    let server = StubServer::start(200, two_routes()).await;
    let cache = Arc::new(RouteCache::in_memory().unwrap());
    let network = Arc::new(NetworkFlag::new(true));
    let source = HttpRouteSource::with_connectivity(
        SourceConfig::with_base_url(server.base_url.clone()),
        cache,
        network.clone(),
    )
    .unwrap();
    let coordinator = MapCoordinator::new(Arc::new(source));

    coordinator.load_nearby(None, None, false).await;
    let state = coordinator.snapshot();
    assert_eq!(state.load_phase(), LoadPhase::Loaded);
    assert_eq!(state.routes.len(), 2);

    // Offline reload serves the cache with the offline notice.
    network.set_online(false);
    coordinator.refresh_routes().await;
    let state = coordinator.snapshot();
    assert!(state.is_offline);
    assert_eq!(state.routes.len(), 2);
    assert_eq!(
        state.notice.as_deref(),
        Some(senderos::coordinator::OFFLINE_NOTICE)
    );
    assert!(state.error_message.is_none());
}
