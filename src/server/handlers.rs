//! HTTP handlers for the search API

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{SearchSettings, ServerConfig, TchallerConfig};
use crate::search::types::{ResponseBundle, SearchFilters, SearchRequest};
use crate::search::SearchEngine;
use crate::server::error::{ApiError, ApiResult};
use crate::storage::{PlaceStore, PopularQuery, SearchAnalytics};

/// Default window for `GET /api/search/popular`, in days
const DEFAULT_POPULAR_DAYS: i64 = 7;

/// Default number of popular queries returned
const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Query-string form of a search request (`GET /api/search`)
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Search query string
    pub q: Option<String>,

    /// Requester latitude
    pub lat: Option<f64>,

    /// Requester longitude
    pub lon: Option<f64>,

    /// Search radius in meters
    pub radius: Option<f64>,

    /// Maximum number of results to return
    pub limit: Option<usize>,

    /// Filter by category id
    pub category_id: Option<i64>,

    /// Filter by activity type id
    pub activity_type_id: Option<i64>,

    /// Filter by zone id
    pub zone_id: Option<i64>,

    /// Filter by price level (1-3)
    pub price_level: Option<u8>,

    /// Minimum verification level
    pub min_verification_level: Option<u8>,

    /// Only verified places
    pub verified_only: Option<bool>,

    /// Minimum rating (0-5)
    pub min_rating: Option<f64>,

    /// Only places currently open
    pub open_now: Option<bool>,

    /// Spoken language
    pub language: Option<String>,

    /// Requester id, recorded in the search log
    pub user_id: Option<i64>,
}

impl SearchParams {
    /// Build a request, filling gaps from the configured defaults
    pub fn into_request(self, defaults: &SearchSettings) -> SearchRequest {
        SearchRequest {
            query: self.q.unwrap_or_default(),
            latitude: self.lat,
            longitude: self.lon,
            radius: self.radius.unwrap_or(defaults.default_radius_m),
            filters: SearchFilters {
                category_id: self.category_id,
                activity_type_id: self.activity_type_id,
                zone_id: self.zone_id,
                price_level: self.price_level,
                min_verification_level: self.min_verification_level,
                verified_only: self.verified_only,
                min_rating: self.min_rating,
                open_now: self.open_now,
                language: self.language,
            },
            limit: self.limit.unwrap_or(defaults.default_limit),
            user_id: self.user_id,
        }
    }
}

/// Query parameters for `GET /api/search/popular`
#[derive(Debug, Default, Deserialize)]
pub struct PopularParams {
    /// Window in days
    pub days: Option<i64>,

    /// Maximum number of queries
    pub limit: Option<usize>,
}

/// State shared across all handlers
///
/// `PlaceStore` serialises its own connection access, so it is shared
/// behind a plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Search pipeline over the store
    pub engine: Arc<SearchEngine>,

    /// Datastore and search log
    pub store: Arc<PlaceStore>,

    /// Immutable configuration
    pub config: Arc<TchallerConfig>,
}

impl AppState {
    /// Create state from a store, wiring the engine with the configured weights
    pub fn new(store: PlaceStore, config: TchallerConfig) -> Self {
        Self::new_from_arc(Arc::new(store), config)
    }

    /// Create state from an already shared store
    pub fn new_from_arc(store: Arc<PlaceStore>, config: TchallerConfig) -> Self {
        let engine = SearchEngine::new(store.clone(), store.clone())
            .with_weights(config.ranking.clone())
            .with_response_config(config.response.clone());

        Self {
            engine: Arc::new(engine),
            store,
            config: Arc::new(config),
        }
    }
}

/// POST /api/search - Conversational search from a JSON body
pub async fn search_post(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<ResponseBundle>> {
    run_search(state, request).await
}

/// GET /api/search - Conversational search from query parameters
pub async fn search_get(
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> ApiResult<Json<ResponseBundle>> {
    let request = params.into_request(&state.config.search);
    run_search(state, request).await
}

async fn run_search(state: AppState, request: SearchRequest) -> ApiResult<Json<ResponseBundle>> {
    request.validate()?;
    info!("Searching: q='{}', limit={}", request.query, request.limit);

    let engine = Arc::clone(&state.engine);
    let bundle = tokio::task::spawn_blocking(move || engine.search(&request))
        .await
        .map_err(|e| ApiError::internal(format!("Search task failed: {}", e)))?;

    Ok(Json(bundle))
}

/// GET /api/search/popular - Most frequent queries over a window
pub async fn popular_queries(
    Query(params): Query<PopularParams>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PopularQuery>>> {
    let days = params.days.unwrap_or(DEFAULT_POPULAR_DAYS);
    let limit = params.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);

    Ok(Json(state.store.popular_queries(days, limit)?))
}

/// GET /api/search/analytics - Aggregate search statistics
pub async fn search_analytics(State(state): State<AppState>) -> ApiResult<Json<SearchAnalytics>> {
    Ok(Json(state.store.analytics()?))
}

/// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "status": "ok",
        "service": "tchaller",
        "version": env!("CARGO_PKG_VERSION"),
        "places": state.store.count_places().ok(),
    })))
}

/// Create router with all API endpoints
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", axum::routing::get(health_check))
        .route("/api/search", axum::routing::get(search_get).post(search_post))
        .route("/api/search/popular", axum::routing::get(popular_queries))
        .route("/api/search/analytics", axum::routing::get(search_analytics))
}

/// Router with tracing, CORS and state attached
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);
    create_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are listed
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::very_permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}
