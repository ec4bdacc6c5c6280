//! Shared fakes for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use senderos::{
    GpsPoint, IdentityProvider, LocationProvider, ProfileStore, ProviderFailure, Route,
    RouteProvider, SenderosError, SessionUser, UserProfile,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn route(id: &str, distance_km: f64, start: GpsPoint) -> Route {
    let path = vec![
        start,
        GpsPoint::new(start.latitude + 0.001, start.longitude + 0.001),
        GpsPoint::new(start.latitude + 0.002, start.longitude + 0.001),
    ];
    Route::from_path(id, format!("Route {}", id), distance_km, None, path).unwrap()
}

// ============================================================================
// Routes API stub
// ============================================================================

/// One API feature in the wire format.
pub fn feature(id: &str, name: &str, distance: &str, coords: &[[f64; 2]]) -> Value {
    json!({
        "type": "Feature",
        "properties": { "id": id, "nombre": name, "distancia": distance, "duracion": "40 min" },
        "geometry": { "type": "LineString", "coordinates": coords }
    })
}

pub fn collection(features: Vec<Value>) -> String {
    json!({ "data": { "type": "FeatureCollection", "features": features } }).to_string()
}

/// Minimal HTTP/1.1 responder on a loopback port. Every request gets the
/// currently configured status and body.
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    reply: Arc<Mutex<(u16, String)>>,
}

impl StubServer {
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let reply = Arc::new(Mutex::new((status, body.into())));

        let seen = requests.clone();
        let current = reply.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let seen = seen.clone();
                let current = current.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    seen.lock().unwrap().push(request_line);

                    let (status, body) = current.lock().unwrap().clone();
                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
            reply,
        }
    }

    pub fn respond_with(&self, status: u16, body: impl Into<String>) {
        *self.reply.lock().unwrap() = (status, body.into());
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

// ============================================================================
// Scripted route provider
// ============================================================================

pub struct ScriptedSource {
    routes: Mutex<Vec<Route>>,
    fail_with: Mutex<Option<u16>>,
    online: AtomicBool,
    calls: Mutex<Vec<(f64, f64, bool)>>,
}

impl ScriptedSource {
    pub fn returning(routes: Vec<Route>) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(routes),
            fail_with: Mutex::new(None),
            online: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with_status(&self, status: Option<u16>) {
        *self.fail_with.lock().unwrap() = status;
    }

    pub fn calls(&self) -> Vec<(f64, f64, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RouteProvider for ScriptedSource {
    async fn fetch_nearby(
        &self,
        lat: f64,
        lng: f64,
        force_refresh: bool,
    ) -> senderos::Result<Vec<Route>> {
        self.calls.lock().unwrap().push((lat, lng, force_refresh));
        let failure = *self.fail_with.lock().unwrap();
        match failure {
            Some(status) => Err(SenderosError::Server { status }),
            None => Ok(self.routes.lock().unwrap().clone()),
        }
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Location provider
// ============================================================================

#[derive(Default)]
pub struct FixedLocation {
    fix: Mutex<Option<GpsPoint>>,
    reads: AtomicUsize,
}

impl FixedLocation {
    pub fn at(point: Option<GpsPoint>) -> Arc<Self> {
        Arc::new(Self {
            fix: Mutex::new(point),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, point: Option<GpsPoint>) {
        *self.fix.lock().unwrap() = point;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl LocationProvider for FixedLocation {
    async fn last_location(&self) -> Option<GpsPoint> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        *self.fix.lock().unwrap()
    }
}

/// Location provider whose reads never complete.
#[derive(Default)]
pub struct HangingLocation {
    reads: AtomicUsize,
}

impl HangingLocation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl LocationProvider for HangingLocation {
    async fn last_location(&self) -> Option<GpsPoint> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        std::future::pending().await
    }
}

// ============================================================================
// Identity and profile backends
// ============================================================================

#[derive(Default)]
pub struct FakeIdentity {
    user: Mutex<Option<SessionUser>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(uid: &str, email: &str) -> Arc<Self> {
        let identity = Self::default();
        *identity.user.lock().unwrap() = Some(SessionUser {
            uid: uid.to_string(),
            email: Some(email.to_string()),
        });
        Arc::new(identity)
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ProviderFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(ProviderFailure::new(message)),
            None => Ok(()),
        }
    }
}

impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<SessionUser, ProviderFailure> {
        self.check()?;
        let user = SessionUser {
            uid: format!("uid-{}", email),
            email: Some(email.to_string()),
        };
        *self.user.lock().unwrap() = Some(user.clone());
        Ok(user)
    }

    async fn register(&self, email: &str, _password: &str) -> Result<String, ProviderFailure> {
        self.check()?;
        Ok(format!("uid-{}", email))
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), ProviderFailure> {
        self.check()
    }

    fn sign_out(&self) {
        *self.user.lock().unwrap() = None;
    }

    fn current_user(&self) -> Option<SessionUser> {
        self.user.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MemoryProfiles {
    docs: Mutex<HashMap<String, UserProfile>>,
    broken: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::Relaxed);
    }

    pub fn doc(&self, uid: &str) -> Option<UserProfile> {
        self.docs.lock().unwrap().get(uid).cloned()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }
}

impl ProfileStore for MemoryProfiles {
    async fn get(&self, uid: &str) -> Result<Option<UserProfile>, ProviderFailure> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(ProviderFailure::new("PERMISSION_DENIED: store disabled"));
        }
        Ok(self.doc(uid))
    }

    async fn put(&self, profile: &UserProfile) -> Result<(), ProviderFailure> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if self.broken.load(Ordering::Relaxed) {
            return Err(ProviderFailure::new("PERMISSION_DENIED: store disabled"));
        }
        self.docs
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}
