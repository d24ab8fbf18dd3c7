// Query planning
//
// *Le Plan* (The Plan) - Compose predicates and ordering from a request and its entities
//
// A plan is an ordered list of predicates that each own their bind values.
// It renders to one parameterized SQLite statement, and the same plan can be
// evaluated in memory against already materialized candidates.

use crate::search::geo::haversine_m;
use crate::search::normalize::fold;
use crate::search::rules::{EntityKind, RuleSet};
use crate::search::types::{AppliedFilters, Candidate, Entities, GeoPoint, SearchRequest};
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;

/// Place columns selected by every plan, in row order
pub const PLACE_COLUMNS: &str = "p.id, p.name, p.description, p.short_description, p.address, \
    p.latitude, p.longitude, p.category_id, p.activity_type_id, p.zone_id, \
    p.phone_number, p.whatsapp_number, p.email, p.website, \
    p.is_active, p.is_open, p.is_verified, p.verification_level, p.price_level, \
    p.rating, p.review_count, p.view_count, p.search_count, \
    p.opening_hours, p.cover_image_url, p.tags, p.keywords, p.languages, p.created_at";

/// Rating floor implied by a positive quality entity
pub const QUALITY_RATING_FLOOR: f64 = 4.0;

/// A bind value owned by a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 64-bit integer
    Integer(i64),

    /// Double precision float
    Real(f64),

    /// UTF-8 text
    Text(String),
}

#[derive(Debug, Default)]
struct Binds {
    values: Vec<SqlValue>,
}

impl Binds {
    /// Append a value and return its numbered placeholder
    fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }
}

/// Price tier derived from a price entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    /// "pas cher", "bon marché"
    Cheap,

    /// Anything not clearly cheap or expensive
    Moderate,

    /// "cher", "coûteux"
    Expensive,
}

impl PriceTier {
    /// Classify a price entity by substring
    pub fn from_entity(text: &str) -> Self {
        if text.contains("pas cher") || text.contains("bon marché") {
            PriceTier::Cheap
        } else if text.contains("cher") || text.contains("chèr") || text.contains("coûteux") {
            PriceTier::Expensive
        } else {
            PriceTier::Moderate
        }
    }

    /// Stored price level (1 to 3)
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            PriceTier::Cheap => 1,
            PriceTier::Moderate => 2,
            PriceTier::Expensive => 3,
        }
    }
}

/// One filter condition of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Only listed places
    Active,

    /// Within `radius_m` of `center`
    WithinRadius {
        /// Reference point
        center: GeoPoint,

        /// Radius in meters
        radius_m: f64,
    },

    /// Exact category id
    CategoryId(i64),

    /// Exact activity type id
    ActivityTypeId(i64),

    /// Category or activity type name contains the given text
    CategoryName(String),

    /// Exact price level
    PriceLevel(u8),

    /// Currently open
    OpenNow,

    /// Verification level at least this
    MinVerificationLevel(u8),

    /// Verified places only
    VerifiedOnly,

    /// Rating at least this
    MinRating(f64),

    /// Name, descriptions, tags or keywords contain the given text
    FreeText(String),

    /// Exact zone id
    Zone(i64),

    /// Spoken language code
    Language(String),
}

impl Predicate {
    fn render(&self, binds: &mut Binds) -> String {
        match self {
            Predicate::Active => "p.is_active = 1".to_string(),
            Predicate::WithinRadius { center, radius_m } => {
                let lat = binds.push(SqlValue::Real(center.latitude));
                let lon = binds.push(SqlValue::Real(center.longitude));
                let radius = binds.push(SqlValue::Real(*radius_m));
                format!("haversine_m({lat}, {lon}, p.latitude, p.longitude) <= {radius}")
            }
            Predicate::CategoryId(id) => {
                format!("p.category_id = {}", binds.push(SqlValue::Integer(*id)))
            }
            Predicate::ActivityTypeId(id) => {
                format!("p.activity_type_id = {}", binds.push(SqlValue::Integer(*id)))
            }
            Predicate::CategoryName(name) => {
                let pattern = binds.push(SqlValue::Text(like_pattern(name)));
                format!(
                    "(fold(c.name) LIKE {pattern} ESCAPE '\\' OR fold(t.name) LIKE {pattern} ESCAPE '\\')"
                )
            }
            Predicate::PriceLevel(level) => {
                format!("p.price_level = {}", binds.push(SqlValue::Integer(i64::from(*level))))
            }
            Predicate::OpenNow => "p.is_open = 1".to_string(),
            Predicate::MinVerificationLevel(level) => format!(
                "p.verification_level >= {}",
                binds.push(SqlValue::Integer(i64::from(*level)))
            ),
            Predicate::VerifiedOnly => "p.is_verified = 1".to_string(),
            Predicate::MinRating(rating) => {
                format!("p.rating >= {}", binds.push(SqlValue::Real(*rating)))
            }
            Predicate::FreeText(term) => {
                let pattern = binds.push(SqlValue::Text(like_pattern(term)));
                let like = format!("LIKE {pattern} ESCAPE '\\'");
                format!(
                    "(fold(p.name) {like} \
                     OR fold(p.description) {like} \
                     OR fold(p.short_description) {like} \
                     OR EXISTS (SELECT 1 FROM json_each(p.tags) AS tag WHERE fold(tag.value) {like}) \
                     OR EXISTS (SELECT 1 FROM json_each(p.keywords) AS kw WHERE fold(kw.value) {like}))"
                )
            }
            Predicate::Zone(id) => format!("p.zone_id = {}", binds.push(SqlValue::Integer(*id))),
            Predicate::Language(code) => {
                let code = binds.push(SqlValue::Text(fold(code)));
                format!(
                    "EXISTS (SELECT 1 FROM json_each(p.languages) AS lang WHERE fold(lang.value) = {code})"
                )
            }
        }
    }

    /// Evaluate the predicate against a materialized candidate
    pub fn matches(&self, candidate: &Candidate) -> bool {
        let place = &candidate.place;
        match self {
            Predicate::Active => place.is_active,
            Predicate::WithinRadius { center, radius_m } => {
                haversine_m(*center, place.location()) <= *radius_m
            }
            Predicate::CategoryId(id) => place.category_id == Some(*id),
            Predicate::ActivityTypeId(id) => place.activity_type_id == Some(*id),
            Predicate::CategoryName(name) => {
                let needle = fold(name);
                contains_folded(candidate.category_name.as_deref(), &needle)
                    || contains_folded(candidate.activity_type_name.as_deref(), &needle)
            }
            Predicate::PriceLevel(level) => place.price_level == Some(*level),
            Predicate::OpenNow => place.is_open,
            Predicate::MinVerificationLevel(level) => place.verification_level >= *level,
            Predicate::VerifiedOnly => place.is_verified,
            Predicate::MinRating(rating) => place.rating >= *rating,
            Predicate::FreeText(term) => {
                let needle = fold(term);
                contains_folded(Some(&place.name), &needle)
                    || contains_folded(place.description.as_deref(), &needle)
                    || contains_folded(place.short_description.as_deref(), &needle)
                    || place.tags.iter().any(|t| contains_folded(Some(t), &needle))
                    || place.keywords.iter().any(|k| contains_folded(Some(k), &needle))
            }
            Predicate::Zone(id) => place.zone_id == Some(*id),
            Predicate::Language(code) => {
                let code = fold(code);
                place.languages.iter().any(|l| fold(l) == code)
            }
        }
    }

    /// Name and value reported in the filters-applied map
    fn applied(&self) -> Option<(&'static str, serde_json::Value)> {
        match self {
            Predicate::Active => None,
            Predicate::WithinRadius { radius_m, .. } => Some(("radius", json!(radius_m))),
            Predicate::CategoryId(id) => Some(("category_id", json!(id))),
            Predicate::ActivityTypeId(id) => Some(("activity_type_id", json!(id))),
            Predicate::CategoryName(name) => Some(("category", json!(name))),
            Predicate::PriceLevel(level) => Some(("price_level", json!(level))),
            Predicate::OpenNow => Some(("open_now", json!(true))),
            Predicate::MinVerificationLevel(level) => {
                Some(("min_verification_level", json!(level)))
            }
            Predicate::VerifiedOnly => Some(("verified_only", json!(true))),
            Predicate::MinRating(rating) => Some(("min_rating", json!(rating))),
            Predicate::FreeText(term) => Some(("text", json!(term))),
            Predicate::Zone(id) => Some(("zone_id", json!(id))),
            Predicate::Language(code) => Some(("language", json!(code))),
        }
    }
}

fn contains_folded(haystack: Option<&str>, folded_needle: &str) -> bool {
    haystack.is_some_and(|h| fold(h).contains(folded_needle))
}

/// `%term%` with LIKE wildcards in the term escaped by a backslash
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in fold(term).chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// One key of the result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKey {
    /// Open places first
    OpenFirst,

    /// Higher verification level first
    VerificationDesc,

    /// Higher rating first
    RatingDesc,

    /// Closer first
    DistanceAsc,

    /// More reviews first
    ReviewCountDesc,

    /// Newer first
    CreatedAtDesc,
}

impl OrderKey {
    fn sql(self) -> &'static str {
        match self {
            OrderKey::OpenFirst => "p.is_open DESC",
            OrderKey::VerificationDesc => "p.verification_level DESC",
            OrderKey::RatingDesc => "p.rating DESC",
            OrderKey::DistanceAsc => "distance ASC",
            OrderKey::ReviewCountDesc => "p.review_count DESC",
            OrderKey::CreatedAtDesc => "p.created_at DESC",
        }
    }

    /// Compare two candidates on this key alone
    pub fn compare(self, a: &Candidate, b: &Candidate) -> Ordering {
        let (pa, pb) = (&a.place, &b.place);
        match self {
            OrderKey::OpenFirst => pb.is_open.cmp(&pa.is_open),
            OrderKey::VerificationDesc => pb.verification_level.cmp(&pa.verification_level),
            OrderKey::RatingDesc => pb.rating.total_cmp(&pa.rating),
            OrderKey::DistanceAsc => match (a.distance, b.distance) {
                (Some(da), Some(db)) => da.total_cmp(&db),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            OrderKey::ReviewCountDesc => pb.review_count.cmp(&pa.review_count),
            OrderKey::CreatedAtDesc => pb.created_at.cmp(&pa.created_at),
        }
    }
}

/// A complete, executable search plan
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Reference point, when the request carried one
    pub reference: Option<GeoPoint>,

    /// Conjunction of filter conditions
    pub predicates: Vec<Predicate>,

    /// Ordering keys, most significant first
    pub ordering: Vec<OrderKey>,

    /// Maximum number of rows
    pub limit: usize,
}

impl QueryPlan {
    /// Render the plan as one SQLite statement and its bind values.
    ///
    /// Placeholders are numbered (`?1`, `?2`, ...) in the order values are
    /// returned. The statement relies on the `haversine_m` and `fold` scalar
    /// functions being registered on the connection.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut binds = Binds::default();

        let distance = match self.reference {
            Some(center) => {
                let lat = binds.push(SqlValue::Real(center.latitude));
                let lon = binds.push(SqlValue::Real(center.longitude));
                format!("haversine_m({lat}, {lon}, p.latitude, p.longitude)")
            }
            None => "NULL".to_string(),
        };

        let mut sql = format!(
            "SELECT {PLACE_COLUMNS}, c.name AS category_name, t.name AS activity_type_name, \
             z.name AS zone_name, {distance} AS distance \
             FROM places p \
             LEFT JOIN categories c ON c.id = p.category_id \
             LEFT JOIN activity_types t ON t.id = p.activity_type_id \
             LEFT JOIN zones z ON z.id = p.zone_id"
        );

        let clauses: Vec<String> = self
            .predicates
            .iter()
            .map(|predicate| predicate.render(&mut binds))
            .collect();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut order: Vec<&str> = self.ordering.iter().map(|key| key.sql()).collect();
        order.push("p.id ASC");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        let limit = binds.push(SqlValue::Integer(self.limit as i64));
        sql.push_str(&format!(" LIMIT {limit}"));

        (sql, binds.values)
    }

    /// Whether a candidate satisfies every predicate
    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.predicates.iter().all(|p| p.matches(candidate))
    }

    /// Plan ordering, with ascending id as the final tie-breaker
    pub fn compare(&self, a: &Candidate, b: &Candidate) -> Ordering {
        self.ordering
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.place.id.cmp(&b.place.id))
    }

    /// Whether the plan carries a predicate equal to `predicate`
    pub fn has(&self, predicate: &Predicate) -> bool {
        self.predicates.contains(predicate)
    }

    /// Filters applied by this plan, keyed by name.
    ///
    /// Free-text terms are grouped under `"text"` as a list.
    pub fn filters_applied(&self) -> AppliedFilters {
        let mut applied = AppliedFilters::new();
        let mut terms = Vec::new();

        for predicate in &self.predicates {
            match predicate.applied() {
                Some(("text", value)) => terms.push(value),
                Some((name, value)) => {
                    applied.insert(name.to_string(), value);
                }
                None => {}
            }
        }
        if !terms.is_empty() {
            applied.insert("text".to_string(), serde_json::Value::Array(terms));
        }

        applied
    }
}

/// Builds a [`QueryPlan`] from a request and its extracted entities
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    rules: Arc<RuleSet>,
}

impl QueryPlanner {
    /// Planner over the built-in category mapping
    pub fn new() -> Self {
        Self::with_rules(RuleSet::shared())
    }

    /// Planner over custom rule tables
    pub fn with_rules(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Plan a search.
    ///
    /// Explicit request filters always take priority over entity-derived
    /// ones. `normalized` is the normalized query, used as a free-text term
    /// when no entity at all was extracted.
    pub fn plan(
        &self,
        request: &SearchRequest,
        normalized: &str,
        entities: &Entities,
    ) -> QueryPlan {
        let filters = &request.filters;
        let reference = request.reference_point();
        let mut predicates = vec![Predicate::Active];

        if let Some(center) = reference {
            predicates.push(Predicate::WithinRadius {
                center,
                radius_m: request.radius,
            });
        }

        if filters.category_id.is_none() && filters.activity_type_id.is_none() {
            if let Some(service_type) = entities.get(&EntityKind::ServiceType) {
                let name = self
                    .rules
                    .categories
                    .resolve(service_type)
                    .unwrap_or(service_type);
                predicates.push(Predicate::CategoryName(name.to_string()));
            }
        }
        if let Some(id) = filters.category_id {
            predicates.push(Predicate::CategoryId(id));
        }
        if let Some(id) = filters.activity_type_id {
            predicates.push(Predicate::ActivityTypeId(id));
        }

        let price_level = filters.price_level.or_else(|| {
            entities
                .get(&EntityKind::PriceLevel)
                .map(|text| PriceTier::from_entity(text).level())
        });
        if let Some(level) = price_level {
            predicates.push(Predicate::PriceLevel(level));
        }

        let open_now = filters.open_now.unwrap_or_else(|| {
            entities
                .get(&EntityKind::TimeConstraint)
                .is_some_and(|text| implies_open_now(text))
        });
        if open_now {
            predicates.push(Predicate::OpenNow);
        }

        if let Some(level) = filters.min_verification_level {
            predicates.push(Predicate::MinVerificationLevel(level));
        }
        if filters.verified_only == Some(true) {
            predicates.push(Predicate::VerifiedOnly);
        }

        let min_rating = filters.min_rating.or_else(|| {
            entities
                .get(&EntityKind::QualityLevel)
                .and_then(|quality| quality_floor(quality, normalized))
        });
        if let Some(rating) = min_rating {
            predicates.push(Predicate::MinRating(rating));
        }

        for term in free_text_terms(normalized, entities) {
            predicates.push(Predicate::FreeText(term));
        }

        if let Some(zone) = filters.zone_id {
            predicates.push(Predicate::Zone(zone));
        }
        if let Some(language) = filters.language.as_deref().filter(|l| !l.trim().is_empty()) {
            predicates.push(Predicate::Language(language.trim().to_string()));
        }

        let mut ordering = vec![
            OrderKey::OpenFirst,
            OrderKey::VerificationDesc,
            OrderKey::RatingDesc,
        ];
        if reference.is_some() {
            ordering.push(OrderKey::DistanceAsc);
        }
        ordering.push(OrderKey::ReviewCountDesc);
        ordering.push(OrderKey::CreatedAtDesc);

        let plan = QueryPlan {
            reference,
            predicates,
            ordering,
            limit: request.limit,
        };
        tracing::debug!(predicates = plan.predicates.len(), limit = plan.limit, "Planned query");
        plan
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn implies_open_now(time_constraint: &str) -> bool {
    ["maintenant", "ce soir", "aujourd'hui", "aujourd’hui"]
        .iter()
        .any(|cue| time_constraint.contains(cue))
}

/// Rating floor for a quality entity.
///
/// "bon" inside "bon marché" is a price cue, not a quality one.
fn quality_floor(quality: &str, normalized: &str) -> Option<f64> {
    let positive = ["excellent", "bon", "recommandé"]
        .iter()
        .any(|cue| quality.contains(cue));
    if !positive {
        return None;
    }
    if quality.starts_with("bon") && !normalized.replace("bon marché", "").contains(quality) {
        return None;
    }
    Some(QUALITY_RATING_FLOOR)
}

/// Free-text terms: dish and service entities, or the whole query when
/// nothing at all was recognized.
///
/// Binding the whole query every time would AND it against name, tags and
/// keywords, so "restaurant pas cher ce soir" would only match a place whose
/// text contains that exact phrase. Recognized phrases already become their
/// own predicates (category, price, open now), so only the unstructured
/// parts are matched as text.
fn free_text_terms(normalized: &str, entities: &Entities) -> Vec<String> {
    let mut terms = Vec::new();

    if let Some(food) = entities.get(&EntityKind::FoodItem) {
        terms.push(food.clone());
    }
    if let Some(item) = entities.get(&EntityKind::ServiceItem) {
        // "coiffure" is both a place type and a service; the category filter covers it
        if entities.get(&EntityKind::ServiceType) != Some(item) {
            terms.push(item.clone());
        }
    }
    if entities.is_empty() && !normalized.is_empty() {
        terms.push(normalized.to_string());
    }

    terms
}
