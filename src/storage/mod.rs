// SQLite datastore
//
// *Le Stockage* (The Storage) - Places, reference tables and the search audit log

pub mod logs;
pub mod places;
pub mod schema;

pub use logs::{PopularQuery, SearchAnalytics, MAX_WINDOW_DAYS};
pub use places::{ActivityTypeRecord, CategoryRecord, SeedData, SeedSummary, ZoneRecord};
pub use schema::PlaceStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON column or seed file could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Seed file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Analytics window outside the accepted range of days
    #[error("Invalid analytics window: {0} days")]
    InvalidWindow(i64),

    /// A previous holder of the connection panicked
    #[error("Connection lock poisoned")]
    Poisoned,
}
