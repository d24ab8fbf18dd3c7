// Place persistence operations

use crate::search::planner::{QueryPlan, SqlValue, PLACE_COLUMNS};
use crate::search::source::{CandidateSource, DatastoreError};
use crate::search::types::{Candidate, Place};
use crate::storage::schema::PlaceStore;
use crate::storage::StorageError;
use rusqlite::types::{ToSqlOutput, Type};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Category record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    /// Unique id
    pub id: i64,

    /// Display name ("Restaurant", "Pharmacie")
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Optional icon name
    #[serde(default)]
    pub icon: Option<String>,
}

/// Activity type record (a finer grain under a category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTypeRecord {
    /// Unique id
    pub id: i64,

    /// Display name ("Maquis", "Pharmacie de garde")
    pub name: String,

    /// Parent category
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Zone (neighbourhood) record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Unique id
    pub id: i64,

    /// Display name ("Tokoin", "Bè")
    pub name: String,

    /// City
    #[serde(default)]
    pub city: Option<String>,
}

/// Bulk data loaded by [`PlaceStore::seed`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    /// Categories
    pub categories: Vec<CategoryRecord>,

    /// Activity types
    pub activity_types: Vec<ActivityTypeRecord>,

    /// Zones
    pub zones: Vec<ZoneRecord>,

    /// Places
    pub places: Vec<Place>,
}

impl SeedData {
    /// Read seed data from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Row counts written by a seed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    /// Categories written
    pub categories: usize,

    /// Activity types written
    pub activity_types: usize,

    /// Zones written
    pub zones: usize,

    /// Places written
    pub places: usize,
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Integer(v) => ToSqlOutput::from(*v),
            SqlValue::Real(v) => ToSqlOutput::from(*v),
            SqlValue::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

impl PlaceStore {
    /// Insert or replace a category
    pub fn upsert_category(&self, record: &CategoryRecord) -> Result<(), StorageError> {
        let conn = self.conn()?;
        upsert_category(&conn, record)
    }

    /// Insert or replace an activity type
    pub fn upsert_activity_type(&self, record: &ActivityTypeRecord) -> Result<(), StorageError> {
        let conn = self.conn()?;
        upsert_activity_type(&conn, record)
    }

    /// Insert or replace a zone
    pub fn upsert_zone(&self, record: &ZoneRecord) -> Result<(), StorageError> {
        let conn = self.conn()?;
        upsert_zone(&conn, record)
    }

    /// Insert or replace a place
    pub fn upsert_place(&self, place: &Place) -> Result<(), StorageError> {
        let conn = self.conn()?;
        upsert_place(&conn, place)
    }

    /// Load seed data in one transaction
    ///
    /// Reference tables are written before places so foreign keys resolve.
    pub fn seed(&self, data: &SeedData) -> Result<SeedSummary, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for record in &data.categories {
            upsert_category(&tx, record)?;
        }
        for record in &data.activity_types {
            upsert_activity_type(&tx, record)?;
        }
        for record in &data.zones {
            upsert_zone(&tx, record)?;
        }
        for place in &data.places {
            upsert_place(&tx, place)?;
        }
        tx.commit()?;

        let summary = SeedSummary {
            categories: data.categories.len(),
            activity_types: data.activity_types.len(),
            zones: data.zones.len(),
            places: data.places.len(),
        };
        tracing::info!(
            categories = summary.categories,
            activity_types = summary.activity_types,
            zones = summary.zones,
            places = summary.places,
            "Seeded place store"
        );
        Ok(summary)
    }

    /// Get a place by id
    pub fn get_place(&self, id: i64) -> Result<Option<Place>, StorageError> {
        let conn = self.conn()?;
        let place = conn
            .query_row(
                &format!("SELECT {PLACE_COLUMNS} FROM places p WHERE p.id = ?1"),
                params![id],
                place_from_row,
            )
            .optional()?;
        Ok(place)
    }

    /// Number of stored places
    pub fn count_places(&self) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl CandidateSource for PlaceStore {
    fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Candidate>, DatastoreError> {
        let (sql, binds) = plan.to_sql();
        let conn = self
            .conn()
            .map_err(|e| DatastoreError::Unavailable(e.to_string()))?;

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DatastoreError::Query(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(binds.iter()), candidate_from_row)
            .map_err(|e| DatastoreError::Query(e.to_string()))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DatastoreError::Decode(e.to_string()))
    }
}

fn upsert_category(conn: &Connection, record: &CategoryRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO categories (id, name, description, icon) VALUES (?1, ?2, ?3, ?4)",
        params![record.id, record.name, record.description, record.icon],
    )?;
    Ok(())
}

fn upsert_activity_type(
    conn: &Connection,
    record: &ActivityTypeRecord,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO activity_types (id, name, category_id) VALUES (?1, ?2, ?3)",
        params![record.id, record.name, record.category_id],
    )?;
    Ok(())
}

fn upsert_zone(conn: &Connection, record: &ZoneRecord) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO zones (id, name, city) VALUES (?1, ?2, ?3)",
        params![record.id, record.name, record.city],
    )?;
    Ok(())
}

fn upsert_place(conn: &Connection, place: &Place) -> Result<(), StorageError> {
    let opening_hours = place
        .opening_hours
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT OR REPLACE INTO places (
            id, name, description, short_description, address, latitude, longitude,
            category_id, activity_type_id, zone_id,
            phone_number, whatsapp_number, email, website,
            is_active, is_open, is_verified, verification_level, price_level,
            rating, review_count, view_count, search_count,
            opening_hours, cover_image_url, tags, keywords, languages, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                  ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)",
        params![
            place.id,
            place.name,
            place.description,
            place.short_description,
            place.address,
            place.latitude,
            place.longitude,
            place.category_id,
            place.activity_type_id,
            place.zone_id,
            place.phone_number,
            place.whatsapp_number,
            place.email,
            place.website,
            place.is_active,
            place.is_open,
            place.is_verified,
            place.verification_level,
            place.price_level,
            place.rating,
            place.review_count,
            place.view_count,
            place.search_count,
            opening_hours,
            place.cover_image_url,
            serde_json::to_string(&place.tags)?,
            serde_json::to_string(&place.keywords)?,
            serde_json::to_string(&place.languages)?,
            place.created_at,
        ],
    )?;
    Ok(())
}

fn place_from_row(row: &Row<'_>) -> rusqlite::Result<Place> {
    let opening_hours: Option<String> = row.get("opening_hours")?;
    let opening_hours = opening_hours
        .map(|raw| decode_json(row, "opening_hours", &raw))
        .transpose()?;

    Ok(Place {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        short_description: row.get("short_description")?,
        address: row.get("address")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        category_id: row.get("category_id")?,
        activity_type_id: row.get("activity_type_id")?,
        zone_id: row.get("zone_id")?,
        phone_number: row.get("phone_number")?,
        whatsapp_number: row.get("whatsapp_number")?,
        email: row.get("email")?,
        website: row.get("website")?,
        is_active: row.get("is_active")?,
        is_open: row.get("is_open")?,
        is_verified: row.get("is_verified")?,
        verification_level: row.get("verification_level")?,
        price_level: row.get("price_level")?,
        rating: row.get("rating")?,
        review_count: row.get("review_count")?,
        view_count: row.get("view_count")?,
        search_count: row.get("search_count")?,
        opening_hours,
        cover_image_url: row.get("cover_image_url")?,
        tags: json_column(row, "tags")?,
        keywords: json_column(row, "keywords")?,
        languages: json_column(row, "languages")?,
        created_at: row.get("created_at")?,
    })
}

fn candidate_from_row(row: &Row<'_>) -> rusqlite::Result<Candidate> {
    Ok(Candidate {
        place: place_from_row(row)?,
        category_name: row.get("category_name")?,
        activity_type_name: row.get("activity_type_name")?,
        zone_name: row.get("zone_name")?,
        distance: row.get("distance")?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    decode_json(row, column, &raw)
}

fn decode_json<T: DeserializeOwned>(row: &Row<'_>, column: &str, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::planner::{OrderKey, Predicate};
    use crate::search::types::GeoPoint;
    use chrono::{TimeZone, Utc};

    fn store_with_places() -> PlaceStore {
        let store = PlaceStore::open_in_memory().unwrap();
        let mut place = Place::new(1, "Maquis Chez Tante Adjo", 6.171, 1.231);
        place.category_id = Some(1);
        place.tags = vec!["Attiéké".to_string(), "poisson braisé".to_string()];
        place.opening_hours = Some(serde_json::json!("24h/24"));
        place.created_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        store
            .seed(&SeedData {
                categories: vec![CategoryRecord {
                    id: 1,
                    name: "Restaurant".to_string(),
                    description: None,
                    icon: None,
                }],
                places: vec![place, Place::new(2, "Bar Le Palmier", 6.30, 1.23)],
                ..Default::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn test_seed_and_get_place() {
        let store = store_with_places();
        assert_eq!(store.count_places().unwrap(), 2);

        let place = store.get_place(1).unwrap().unwrap();
        assert_eq!(place.name, "Maquis Chez Tante Adjo");
        assert_eq!(place.tags, vec!["Attiéké", "poisson braisé"]);
        assert_eq!(place.opening_hours, Some(serde_json::json!("24h/24")));
        assert_eq!(place.created_at, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        assert!(store.get_place(99).unwrap().is_none());
    }

    #[test]
    fn test_fetch_joins_and_filters() {
        let store = store_with_places();
        let plan = QueryPlan {
            reference: Some(GeoPoint::new(6.17, 1.23)),
            predicates: vec![
                Predicate::Active,
                Predicate::WithinRadius {
                    center: GeoPoint::new(6.17, 1.23),
                    radius_m: 5000.0,
                },
                Predicate::FreeText("attiéké".to_string()),
            ],
            ordering: vec![OrderKey::OpenFirst, OrderKey::DistanceAsc],
            limit: 10,
        };

        let candidates = store.fetch(&plan).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].place.id, 1);
        assert_eq!(candidates[0].category_name.as_deref(), Some("Restaurant"));
        let distance = candidates[0].distance.unwrap();
        assert!(distance > 100.0 && distance < 200.0, "{distance}");
    }

    #[test]
    fn test_single_row_upserts_replace_and_join() {
        let store = PlaceStore::open_in_memory().unwrap();
        let mut category = CategoryRecord {
            id: 1,
            name: "Santé".to_string(),
            description: None,
            icon: None,
        };
        store.upsert_category(&category).unwrap();
        category.name = "Pharmacie".to_string();
        store.upsert_category(&category).unwrap();
        store
            .upsert_activity_type(&ActivityTypeRecord {
                id: 4,
                name: "Pharmacie de garde".to_string(),
                category_id: Some(1),
            })
            .unwrap();
        store
            .upsert_zone(&ZoneRecord {
                id: 2,
                name: "Bè".to_string(),
                city: Some("Lomé".to_string()),
            })
            .unwrap();

        let mut place = Place::new(7, "Pharmacie de Bè", 6.17, 1.23);
        place.category_id = Some(1);
        place.activity_type_id = Some(4);
        place.zone_id = Some(2);
        store.upsert_place(&place).unwrap();
        place.rating = 4.4;
        store.upsert_place(&place).unwrap();

        assert_eq!(store.count_places().unwrap(), 1);
        assert_eq!(store.get_place(7).unwrap().unwrap().rating, 4.4);

        let plan = QueryPlan {
            reference: None,
            predicates: vec![Predicate::CategoryName("de garde".to_string())],
            ordering: vec![OrderKey::OpenFirst],
            limit: 10,
        };
        let candidates = store.fetch(&plan).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].category_name.as_deref(), Some("Pharmacie"));
        assert_eq!(candidates[0].activity_type_name.as_deref(), Some("Pharmacie de garde"));
        assert_eq!(candidates[0].zone_name.as_deref(), Some("Bè"));
    }
}
