//! # Route Cache
//!
//! SQLite table of the last successfully fetched routes.
//!
//! Every successful network refresh replaces the whole table inside one
//! transaction; there is no merge. Paths are stored as MessagePack blobs of
//! `[lon, lat]` pairs, the same order the routes API uses.

use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use crate::{GpsPoint, Result, Route};

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        CREATE TABLE IF NOT EXISTS routes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            distance REAL NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            description TEXT,
            coordinates BLOB NOT NULL,
            last_updated INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_routes_last_updated ON routes(last_updated);
        "#,
    )])
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, distance, latitude, longitude, description, coordinates FROM routes";

/// Persisted route table.
pub struct RouteCache {
    db: Mutex<Connection>,
}

impl RouteCache {
    /// Open (or create) the cache at the given database path.
    pub fn open(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::with_connection(db)
    }

    /// Create an in-memory cache (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut db: Connection) -> Result<Self> {
        migrations().to_latest(&mut db)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite consistent (writes are
        // transactional), so the poisoned guard is still usable.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All cached routes.
    pub fn get_all(&self) -> Result<Vec<Route>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let routes = stmt
            .query_map([], row_to_route)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("[RouteCache] Loaded {} cached routes", routes.len());
        Ok(routes)
    }

    /// A single cached route.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Route>> {
        let conn = self.conn();
        let route = conn
            .query_row(
                &format!("{} WHERE id = ?", SELECT_COLUMNS),
                params![id],
                row_to_route,
            )
            .optional()?;
        Ok(route)
    }

    /// Clear the table and insert `routes`, all in one transaction.
    pub fn replace_all(&self, routes: &[Route]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM routes", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO routes
                 (id, name, distance, latitude, longitude, description, coordinates, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for route in routes {
                stmt.execute(params![
                    route.id,
                    route.name,
                    route.distance_km,
                    route.latitude,
                    route.longitude,
                    route.description,
                    encode_path(&route.path)?,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        info!("[RouteCache] Replaced cache with {} routes", routes.len());
        Ok(())
    }

    /// Insert or overwrite a single route.
    pub fn insert(&self, route: &Route) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn().execute(
            "INSERT OR REPLACE INTO routes
             (id, name, distance, latitude, longitude, description, coordinates, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                route.id,
                route.name,
                route.distance_km,
                route.latitude,
                route.longitude,
                route.description,
                encode_path(&route.path)?,
                now,
            ],
        )?;
        Ok(())
    }

    /// Number of cached routes.
    pub fn count(&self) -> Result<u32> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM routes", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    /// Most recent write time (epoch milliseconds), `None` when empty.
    pub fn last_updated(&self) -> Result<Option<i64>> {
        let ts: Option<i64> =
            self.conn()
                .query_row("SELECT MAX(last_updated) FROM routes", [], |row| row.get(0))?;
        Ok(ts)
    }

    /// Remove every cached route.
    pub fn clear(&self) -> Result<()> {
        self.conn().execute("DELETE FROM routes", [])?;
        Ok(())
    }
}

fn encode_path(path: &[GpsPoint]) -> Result<Vec<u8>> {
    let pairs: Vec<[f64; 2]> = path.iter().map(GpsPoint::to_lon_lat).collect();
    rmp_serde::to_vec(&pairs)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)).into())
}

fn decode_path(id: &str, blob: &[u8]) -> Vec<GpsPoint> {
    match rmp_serde::from_slice::<Vec<[f64; 2]>>(blob) {
        Ok(pairs) => pairs.into_iter().map(GpsPoint::from_lon_lat).collect(),
        Err(e) => {
            warn!("[RouteCache] Unreadable path for route {}: {}", id, e);
            Vec::new()
        }
    }
}

fn row_to_route(row: &Row<'_>) -> rusqlite::Result<Route> {
    let id: String = row.get(0)?;
    let blob: Vec<u8> = row.get(6)?;
    let path = decode_path(&id, &blob);
    Ok(Route {
        name: row.get(1)?,
        distance_km: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        description: row.get(5)?,
        path,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route(id: &str, distance_km: f64) -> Route {
        let path = (0..5)
            .map(|i| GpsPoint::new(4.63 + i as f64 * 0.001, -74.08 + i as f64 * 0.0005))
            .collect();
        Route::from_path(id, format!("Route {}", id), distance_km, None, path).unwrap()
    }

    #[test]
    fn test_create_cache() {
        let cache = RouteCache::in_memory().unwrap();
        assert_eq!(cache.count().unwrap(), 0);
        assert!(cache.get_all().unwrap().is_empty());
        assert_eq!(cache.last_updated().unwrap(), None);
    }

    #[test]
    fn test_replace_all_and_read_back() {
        let cache = RouteCache::in_memory().unwrap();
        let mut route = sample_route("r1", 2.5);
        route.description = Some("45 min".to_string());
        cache.replace_all(&[route.clone(), sample_route("r2", 7.0)]).unwrap();

        assert_eq!(cache.count().unwrap(), 2);
        let loaded = cache.get_by_id("r1").unwrap().unwrap();
        assert_eq!(loaded, route);
        assert!(cache.get_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_replace_all_is_not_a_merge() {
        let cache = RouteCache::in_memory().unwrap();
        cache
            .replace_all(&[sample_route("r1", 1.0), sample_route("r2", 2.0)])
            .unwrap();
        cache.replace_all(&[sample_route("r3", 3.0)]).unwrap();

        let ids: Vec<String> = cache.get_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r3".to_string()]);
    }

    #[test]
    fn test_last_updated() {
        let cache = RouteCache::in_memory().unwrap();
        let before = chrono::Utc::now().timestamp_millis();
        cache.replace_all(&[sample_route("r1", 1.0)]).unwrap();
        let ts = cache.last_updated().unwrap().unwrap();
        assert!(ts >= before);
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = RouteCache::in_memory().unwrap();
        cache.insert(&sample_route("r1", 1.0)).unwrap();
        cache.insert(&sample_route("r1", 9.0)).unwrap();
        assert_eq!(cache.count().unwrap(), 1);
        assert_eq!(cache.get_by_id("r1").unwrap().unwrap().distance_km, 9.0);
    }

    #[test]
    fn test_empty_path_round_trip() {
        let cache = RouteCache::in_memory().unwrap();
        let route = Route::new("r0", "No path", 1.0, GpsPoint::new(4.6, -74.1), None, vec![]);
        cache.insert(&route).unwrap();
        assert_eq!(cache.get_by_id("r0").unwrap().unwrap(), route);
    }

    #[test]
    fn test_unreadable_path_keeps_row() {
        let cache = RouteCache::in_memory().unwrap();
        cache.insert(&sample_route("r1", 2.0)).unwrap();
        // 0xc1 is never a valid MessagePack marker
        cache
            .conn()
            .execute("UPDATE routes SET coordinates = x'c1ff' WHERE id = 'r1'", [])
            .unwrap();

        let routes = cache.get_all().unwrap();
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.id, "r1");
        assert!(route.path.is_empty());
        assert_eq!(route.latitude, 4.63);
        assert_eq!(route.longitude, -74.08);
        assert_eq!(route.distance_km, 2.0);
    }

    #[test]
    fn test_concurrent_replace_all_never_mixes() {
        let cache = std::sync::Arc::new(RouteCache::in_memory().unwrap());
        let set_a: Vec<Route> = ["a1", "a2", "a3"].iter().map(|id| sample_route(id, 1.0)).collect();
        let set_b: Vec<Route> = ["b1", "b2"].iter().map(|id| sample_route(id, 2.0)).collect();
        cache.replace_all(&set_a).unwrap();

        let ids_a = vec!["a1".to_string(), "a2".to_string(), "a3".to_string()];
        let ids_b = vec!["b1".to_string(), "b2".to_string()];
        let sorted_ids = |cache: &RouteCache| {
            let mut ids: Vec<String> = cache.get_all().unwrap().into_iter().map(|r| r.id).collect();
            ids.sort();
            ids
        };

        let writers: Vec<_> = [set_a, set_b]
            .into_iter()
            .map(|set| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        cache.replace_all(&set).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let cache = cache.clone();
            let (ids_a, ids_b) = (ids_a.clone(), ids_b.clone());
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let ids = sorted_ids(&*cache);
                    assert!(ids == ids_a || ids == ids_b, "mixed table: {:?}", ids);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let ids = sorted_ids(&*cache);
        assert!(ids == ids_a || ids == ids_b, "mixed table: {:?}", ids);
    }

    #[test]
    fn test_clear() {
        let cache = RouteCache::in_memory().unwrap();
        cache.replace_all(&[sample_route("r1", 1.0)]).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.count().unwrap(), 0);
    }
}
