// Storage schema and database management

use crate::config::StorageConfig;
use crate::search::geo::haversine_m;
use crate::search::normalize::fold;
use crate::search::types::GeoPoint;
use crate::storage::StorageError;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Main storage interface
///
/// Owns one SQLite connection behind a mutex; every operation holds the lock
/// for its own duration only.
pub struct PlaceStore {
    conn: Mutex<Connection>,
    config: StorageConfig,
}

impl PlaceStore {
    /// Open storage with default config
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open_with_config(path, StorageConfig::default())
    }

    /// Open the database named by `config.db_path`
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let path = config.db_path.clone();
        Self::open_with_config(path, config)
    }

    /// Open storage with custom config
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: StorageConfig,
    ) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        if config.wal_enabled {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        // Set cache size if specified
        if let Some(cache_size) = config.cache_size_pages {
            conn.pragma_update(None, "cache_size", cache_size)?;
        }

        Self::setup(conn, config)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let config = StorageConfig {
            db_path: ":memory:".to_string(),
            wal_enabled: false,
            cache_size_pages: None,
        };
        Self::setup(conn, config)
    }

    fn setup(conn: Connection, config: StorageConfig) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_functions(&conn)?;
        initialize_schema(&conn)?;

        tracing::debug!(db_path = %config.db_path, "Opened place store");
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Storage configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Lock the connection
    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

/// Register the scalar functions used by query plans.
///
/// - `haversine_m(lat1, lon1, lat2, lon2)` - great-circle distance in meters
/// - `fold(text)` - lowercase + NFC, NULL stays NULL
pub fn register_functions(conn: &Connection) -> SqliteResult<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("haversine_m", 4, flags, |ctx| {
        let a = GeoPoint::new(ctx.get::<f64>(0)?, ctx.get::<f64>(1)?);
        let b = GeoPoint::new(ctx.get::<f64>(2)?, ctx.get::<f64>(3)?);
        Ok(haversine_m(a, b))
    })?;

    conn.create_scalar_function("fold", 1, flags, |ctx| {
        let text = ctx.get::<Option<String>>(0)?;
        Ok(text.map(|t| fold(&t)))
    })?;

    Ok(())
}

/// Initialize database schema
fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    icon TEXT
);

CREATE TABLE IF NOT EXISTS activity_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category_id INTEGER REFERENCES categories(id),
    UNIQUE(name, category_id)
);

CREATE TABLE IF NOT EXISTS zones (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    city TEXT
);

CREATE TABLE IF NOT EXISTS places (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    short_description TEXT,
    address TEXT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    category_id INTEGER REFERENCES categories(id),
    activity_type_id INTEGER REFERENCES activity_types(id),
    zone_id INTEGER REFERENCES zones(id),
    phone_number TEXT,
    whatsapp_number TEXT,
    email TEXT,
    website TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_open INTEGER NOT NULL DEFAULT 1,
    is_verified INTEGER NOT NULL DEFAULT 0,
    verification_level INTEGER NOT NULL DEFAULT 0,
    price_level INTEGER,
    rating REAL NOT NULL DEFAULT 0,
    review_count INTEGER NOT NULL DEFAULT 0,
    view_count INTEGER NOT NULL DEFAULT 0,
    search_count INTEGER NOT NULL DEFAULT 0,
    opening_hours TEXT,
    cover_image_url TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    keywords TEXT NOT NULL DEFAULT '[]',
    languages TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_places_active_open ON places(is_active, is_open);
CREATE INDEX IF NOT EXISTS idx_places_category ON places(category_id);
CREATE INDEX IF NOT EXISTS idx_places_activity_type ON places(activity_type_id);
CREATE INDEX IF NOT EXISTS idx_places_zone ON places(zone_id);
CREATE INDEX IF NOT EXISTS idx_places_lat_lon ON places(latitude, longitude);

CREATE TABLE IF NOT EXISTS search_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    normalized_query TEXT NOT NULL,
    intent TEXT NOT NULL,
    entities TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    result_ids TEXT NOT NULL,
    elapsed_ms REAL NOT NULL,
    user_id INTEGER,
    latitude REAL,
    longitude REAL,
    radius REAL NOT NULL,
    filters TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_logs_created ON search_logs(created_at);
CREATE INDEX IF NOT EXISTS idx_search_logs_normalized ON search_logs(normalized_query);
"#,
    )
}
