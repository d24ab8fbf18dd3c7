// Search data model
//
// Requests, persisted places, per-query views and the bundles handed back to callers.

use crate::search::rules::{EntityKind, Intent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum accepted query length, in characters
pub const MAX_QUERY_CHARS: usize = 500;

/// Default search radius in meters
pub const DEFAULT_RADIUS_M: f64 = 5000.0;

/// Smallest accepted search radius in meters
pub const MIN_RADIUS_M: f64 = 100.0;

/// Largest accepted search radius in meters
pub const MAX_RADIUS_M: f64 = 50_000.0;

/// Default number of results
pub const DEFAULT_LIMIT: usize = 10;

/// Largest accepted number of results
pub const MAX_LIMIT: usize = 50;

/// Entities extracted from a query, at most one value per category
pub type Entities = BTreeMap<EntityKind, String>;

/// Filters that were applied to a search, keyed by filter name
pub type AppliedFilters = BTreeMap<String, serde_json::Value>;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Structured filters carried by a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    /// Exact category id
    pub category_id: Option<i64>,

    /// Exact activity type id
    pub activity_type_id: Option<i64>,

    /// Exact zone id
    pub zone_id: Option<i64>,

    /// Price level, 1 (cheap) to 3 (expensive)
    pub price_level: Option<u8>,

    /// Minimum verification level
    pub min_verification_level: Option<u8>,

    /// Only verified places
    pub verified_only: Option<bool>,

    /// Minimum rating, 0 to 5
    pub min_rating: Option<f64>,

    /// Only places currently open
    pub open_now: Option<bool>,

    /// Spoken language code (e.g. "fr", "ee")
    pub language: Option<String>,
}

/// A free-text, optionally geolocated search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query text
    pub query: String,

    /// Requester latitude
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Requester longitude
    #[serde(default)]
    pub longitude: Option<f64>,

    /// Search radius in meters
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Structured filters
    #[serde(default)]
    pub filters: SearchFilters,

    /// Maximum number of ranked results
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Requester id, for the audit log
    #[serde(default)]
    pub user_id: Option<i64>,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_M
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchRequest {
    /// Create a request with default radius and limit
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            latitude: None,
            longitude: None,
            radius: DEFAULT_RADIUS_M,
            filters: SearchFilters::default(),
            limit: DEFAULT_LIMIT,
            user_id: None,
        }
    }

    /// Set the reference point
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Set the radius in meters
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the result limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Replace the structured filters
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the requester id
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Reference point, when both coordinates are present
    pub fn reference_point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Check every field against its declared bounds
    pub fn validate(&self) -> Result<(), RequestError> {
        let query_chars = self.query.trim().chars().count();
        if query_chars == 0 {
            return Err(RequestError::EmptyQuery);
        }
        if query_chars > MAX_QUERY_CHARS {
            return Err(RequestError::QueryTooLong(query_chars));
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    return Err(RequestError::LatitudeOutOfRange(lat));
                }
                if !(-180.0..=180.0).contains(&lon) {
                    return Err(RequestError::LongitudeOutOfRange(lon));
                }
            }
            (None, None) => {}
            _ => return Err(RequestError::IncompleteLocation),
        }

        if !(MIN_RADIUS_M..=MAX_RADIUS_M).contains(&self.radius) {
            return Err(RequestError::RadiusOutOfRange(self.radius));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(RequestError::LimitOutOfRange(self.limit));
        }
        if let Some(level) = self.filters.price_level {
            if !(1..=3).contains(&level) {
                return Err(RequestError::PriceLevelOutOfRange(level));
            }
        }
        if let Some(rating) = self.filters.min_rating {
            if !(0.0..=5.0).contains(&rating) {
                return Err(RequestError::MinRatingOutOfRange(rating));
            }
        }

        Ok(())
    }

    /// Copy of the request with every bounded field forced into range.
    ///
    /// The engine runs on sanitized requests so that a caller which skipped
    /// [`SearchRequest::validate`] still gets a well-formed answer.
    pub fn sanitized(&self) -> Self {
        let mut request = self.clone();

        if request.query.chars().count() > MAX_QUERY_CHARS {
            request.query = request.query.chars().take(MAX_QUERY_CHARS).collect();
        }

        request.radius = if request.radius.is_finite() {
            request.radius.clamp(MIN_RADIUS_M, MAX_RADIUS_M)
        } else {
            DEFAULT_RADIUS_M
        };
        request.limit = request.limit.clamp(1, MAX_LIMIT);

        // A half-specified or out-of-range location is dropped rather than guessed
        let location_ok = matches!(
            (request.latitude, request.longitude),
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
        );
        if !location_ok {
            request.latitude = None;
            request.longitude = None;
        }

        request.filters.price_level = request.filters.price_level.map(|p| p.clamp(1, 3));
        request.filters.min_rating = request
            .filters
            .min_rating
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 5.0));

        request
    }
}

/// Request validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    /// Query is empty after trimming
    #[error("Query must not be empty")]
    EmptyQuery,

    /// Query exceeds the character limit
    #[error("Query is {0} characters long, maximum is 500")]
    QueryTooLong(usize),

    /// Only one of latitude/longitude was given
    #[error("Latitude and longitude must be given together")]
    IncompleteLocation,

    /// Latitude outside [-90, 90]
    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180]
    #[error("Longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// Radius outside [100, 50000]
    #[error("Radius {0}m is outside [100, 50000]")]
    RadiusOutOfRange(f64),

    /// Limit outside [1, 50]
    #[error("Limit {0} is outside [1, 50]")]
    LimitOutOfRange(usize),

    /// Price level outside [1, 3]
    #[error("Price level {0} is outside [1, 3]")]
    PriceLevelOutOfRange(u8),

    /// Minimum rating outside [0, 5]
    #[error("Minimum rating {0} is outside [0, 5]")]
    MinRatingOutOfRange(f64),
}

/// A place as persisted by the datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Unique id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Long description
    #[serde(default)]
    pub description: Option<String>,

    /// One-line description
    #[serde(default)]
    pub short_description: Option<String>,

    /// Street address
    #[serde(default)]
    pub address: Option<String>,

    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Category id
    #[serde(default)]
    pub category_id: Option<i64>,

    /// Activity type id
    #[serde(default)]
    pub activity_type_id: Option<i64>,

    /// Zone (neighbourhood) id
    #[serde(default)]
    pub zone_id: Option<i64>,

    /// Phone number
    #[serde(default)]
    pub phone_number: Option<String>,

    /// WhatsApp number
    #[serde(default)]
    pub whatsapp_number: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Website URL
    #[serde(default)]
    pub website: Option<String>,

    /// Listed and searchable
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Currently open
    #[serde(default = "default_true")]
    pub is_open: bool,

    /// Verified by the community or staff
    #[serde(default)]
    pub is_verified: bool,

    /// Verification depth, 0 (none) to 3 (premium)
    #[serde(default)]
    pub verification_level: u8,

    /// Price level, 1 to 3
    #[serde(default)]
    pub price_level: Option<u8>,

    /// Average rating, 0 to 5
    #[serde(default)]
    pub rating: f64,

    /// Number of reviews
    #[serde(default)]
    pub review_count: u32,

    /// Number of profile views
    #[serde(default)]
    pub view_count: u32,

    /// Number of times returned by a search
    #[serde(default)]
    pub search_count: u32,

    /// Opening hours, free-form JSON (`{"today": "8h-22h"}` or a plain string)
    #[serde(default)]
    pub opening_hours: Option<serde_json::Value>,

    /// Cover image URL
    #[serde(default)]
    pub cover_image_url: Option<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Spoken language codes
    #[serde(default)]
    pub languages: Vec<String>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Place {
    /// Create an active, open, unverified place with no optional data
    pub fn new(id: i64, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            short_description: None,
            address: None,
            latitude,
            longitude,
            category_id: None,
            activity_type_id: None,
            zone_id: None,
            phone_number: None,
            whatsapp_number: None,
            email: None,
            website: None,
            is_active: true,
            is_open: true,
            is_verified: false,
            verification_level: 0,
            price_level: None,
            rating: 0.0,
            review_count: 0,
            view_count: 0,
            search_count: 0,
            opening_hours: None,
            cover_image_url: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            languages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Location of the place
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Description length in characters (0 when absent)
    pub fn description_len(&self) -> usize {
        self.description
            .as_deref()
            .map(|d| d.chars().count())
            .unwrap_or(0)
    }

    /// Whether a cover image is set
    pub fn has_cover_image(&self) -> bool {
        has_text(&self.cover_image_url)
    }

    /// Whether opening hours carry any information
    pub fn has_opening_hours(&self) -> bool {
        match &self.opening_hours {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Whether any contact channel is set
    pub fn has_contact_channel(&self) -> bool {
        has_text(&self.phone_number)
            || has_text(&self.whatsapp_number)
            || has_text(&self.email)
            || has_text(&self.website)
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// A place returned for one search: persisted fields plus per-query data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Persisted place
    #[serde(flatten)]
    pub place: Place,

    /// Joined category name
    pub category_name: Option<String>,

    /// Joined activity type name
    pub activity_type_name: Option<String>,

    /// Joined zone name
    pub zone_name: Option<String>,

    /// Distance to the reference point in meters, when one was supplied
    pub distance: Option<f64>,
}

impl Candidate {
    /// Wrap a place with no computed fields
    pub fn new(place: Place) -> Self {
        Self {
            place,
            category_name: None,
            activity_type_name: None,
            zone_name: None,
            distance: None,
        }
    }

    /// Set the distance in meters
    pub fn with_distance(mut self, meters: f64) -> Self {
        self.distance = Some(meters);
        self
    }

    /// Set the category name
    pub fn with_category(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }

    /// Set the activity type name
    pub fn with_activity_type(mut self, name: impl Into<String>) -> Self {
        self.activity_type_name = Some(name.into());
        self
    }
}

/// A candidate with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Scored candidate
    #[serde(flatten)]
    pub candidate: Candidate,

    /// Relevance score, higher is better
    pub relevance_score: f64,
}

/// Audit record written once per search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchLog {
    /// Raw query text
    pub query: String,

    /// Normalized query text
    pub normalized_query: String,

    /// Classified intent
    pub intent: Intent,

    /// Extracted entities
    pub entities: Entities,

    /// Number of candidates returned by the datastore
    pub result_count: usize,

    /// Ids of the ranked results handed back
    pub result_ids: Vec<i64>,

    /// Elapsed time at logging, in milliseconds
    pub elapsed_ms: f64,

    /// Requester id
    pub user_id: Option<i64>,

    /// Reference point
    pub location: Option<GeoPoint>,

    /// Search radius in meters
    pub radius: f64,

    /// Filters applied to the query plan
    pub filters: AppliedFilters,
}

/// Everything a caller gets back from one search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBundle {
    /// Original query text
    pub query: String,

    /// Normalized query text
    pub normalized_query: String,

    /// Classified intent
    pub intent: Intent,

    /// Extracted entities
    pub entities: Entities,

    /// Ranked results, at most `limit`
    pub results: Vec<RankedResult>,

    /// Number of candidates returned by the datastore
    pub total_results: usize,

    /// Total elapsed time in milliseconds
    pub elapsed_ms: f64,

    /// Synthesized natural-language reply
    pub response: String,

    /// Follow-up query suggestions
    pub suggestions: Vec<String>,

    /// Filters applied to the query plan
    pub filters_applied: AppliedFilters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = SearchRequest::new("pharmacie");
        assert_eq!(request.radius, DEFAULT_RADIUS_M);
        assert_eq!(request.limit, DEFAULT_LIMIT);
        assert!(request.reference_point().is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_deserialize_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "maquis", "latitude": 6.17, "longitude": 1.23}"#)
                .unwrap();
        assert_eq!(request.radius, 5000.0);
        assert_eq!(request.limit, 10);
        assert_eq!(request.reference_point(), Some(GeoPoint::new(6.17, 1.23)));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds() {
        assert_eq!(
            SearchRequest::new("   ").validate(),
            Err(RequestError::EmptyQuery)
        );
        assert!(matches!(
            SearchRequest::new("bar").with_radius(50.0).validate(),
            Err(RequestError::RadiusOutOfRange(_))
        ));
        assert!(matches!(
            SearchRequest::new("bar").with_limit(51).validate(),
            Err(RequestError::LimitOutOfRange(51))
        ));

        let mut half_located = SearchRequest::new("bar");
        half_located.latitude = Some(6.1);
        assert_eq!(
            half_located.validate(),
            Err(RequestError::IncompleteLocation)
        );

        let filters = SearchFilters {
            price_level: Some(4),
            ..Default::default()
        };
        assert!(matches!(
            SearchRequest::new("bar").with_filters(filters).validate(),
            Err(RequestError::PriceLevelOutOfRange(4))
        ));
    }

    #[test]
    fn test_sanitized_clamps_into_bounds() {
        let filters = SearchFilters {
            price_level: Some(9),
            min_rating: Some(7.5),
            ..Default::default()
        };
        let request = SearchRequest::new("x".repeat(600))
            .with_radius(1_000_000.0)
            .with_limit(0)
            .with_filters(filters)
            .sanitized();

        assert_eq!(request.query.chars().count(), MAX_QUERY_CHARS);
        assert_eq!(request.radius, MAX_RADIUS_M);
        assert_eq!(request.limit, 1);
        assert_eq!(request.filters.price_level, Some(3));
        assert_eq!(request.filters.min_rating, Some(5.0));
    }

    #[test]
    fn test_sanitized_drops_invalid_location() {
        let mut request = SearchRequest::new("bar");
        request.latitude = Some(120.0);
        request.longitude = Some(1.2);
        let request = request.sanitized();
        assert!(request.reference_point().is_none());
    }

    #[test]
    fn test_completeness_flags() {
        let mut place = Place::new(1, "Chez Tante Adjo", 6.13, 1.22);
        assert!(!place.has_contact_channel());
        assert!(!place.has_opening_hours());
        assert!(!place.has_cover_image());

        place.website = Some("https://tante-adjo.tg".to_string());
        place.opening_hours = Some(serde_json::json!({"today": "11h-23h"}));
        place.cover_image_url = Some("https://cdn.tchaller.tg/adjo.jpg".to_string());
        place.description = Some("Cuisine togolaise".to_string());

        assert!(place.has_contact_channel());
        assert!(place.has_opening_hours());
        assert!(place.has_cover_image());
        assert_eq!(place.description_len(), 17);
    }

    #[test]
    fn test_empty_opening_hours_object_is_absent() {
        let mut place = Place::new(1, "Bar du Port", 6.13, 1.22);
        place.opening_hours = Some(serde_json::json!({}));
        assert!(!place.has_opening_hours());
    }
}
