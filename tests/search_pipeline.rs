// End-to-end pipeline tests over the in-memory collaborators

use std::sync::Arc;

use tchaller::search::geo::offset_north;
use tchaller::search::response::Slot;
use tchaller::search::{
    Candidate, CandidateSource, DatastoreError, EntityKind, GeoPoint, InMemorySource, Intent,
    LoggingError, MemoryLogSink, Place, Predicate, QueryAnalyzer, QueryPlan, QueryPlanner,
    ResponseConfig, ResponseSynthesizer, SearchEngine, SearchLog, SearchLogSink, SearchRequest,
    SynthesisContext, Template,
};

const ORIGIN: GeoPoint = GeoPoint {
    latitude: 6.17,
    longitude: 1.23,
};

fn place_at(id: i64, name: &str, meters_north: f64) -> Place {
    let point = offset_north(ORIGIN, meters_north);
    Place::new(id, name, point.latitude, point.longitude)
}

fn seeded_engine(candidates: Vec<Candidate>) -> (SearchEngine, Arc<MemoryLogSink>) {
    let sink = Arc::new(MemoryLogSink::new());
    let engine = SearchEngine::new(Arc::new(InMemorySource::new(candidates)), sink.clone())
        .with_response_config(ResponseConfig {
            seed: Some(2024),
            ..Default::default()
        });
    (engine, sink)
}

struct FailingSource;

impl CandidateSource for FailingSource {
    fn fetch(&self, _plan: &QueryPlan) -> Result<Vec<Candidate>, DatastoreError> {
        Err(DatastoreError::Unavailable("connection refused".to_string()))
    }
}

struct FailingSink;

impl SearchLogSink for FailingSink {
    fn record(&self, _log: &SearchLog) -> Result<(), LoggingError> {
        Err(LoggingError::Write("disk full".to_string()))
    }
}

#[test]
fn cheap_restaurant_tonight_plans_price_and_open_filters() {
    let analyzer = QueryAnalyzer::new();
    let analyzed = analyzer.analyze("restaurant pas cher ce soir");

    assert!(matches!(analyzed.intent, Intent::SearchPlace | Intent::FindByService));
    assert_eq!(analyzed.entity(EntityKind::PriceLevel), Some("pas cher"));
    assert_eq!(analyzed.entity(EntityKind::TimeConstraint), Some("ce soir"));

    let request = SearchRequest::new("restaurant pas cher ce soir")
        .with_location(ORIGIN.latitude, ORIGIN.longitude)
        .with_radius(5000.0);
    let plan = QueryPlanner::new().plan(&request, &analyzed.normalized, &analyzed.entities);

    assert!(plan.has(&Predicate::PriceLevel(1)));
    assert!(plan.has(&Predicate::OpenNow));
    assert!(plan.has(&Predicate::CategoryName("Restaurant".to_string())));
}

#[test]
fn cheap_restaurant_tonight_returns_only_matching_places() {
    let mut cheap_open = place_at(1, "Maquis du Port", 800.0);
    cheap_open.price_level = Some(1);

    let mut expensive = place_at(2, "Le Gourmet", 500.0);
    expensive.price_level = Some(3);

    let mut cheap_closed = place_at(3, "Chez Fofo", 300.0);
    cheap_closed.price_level = Some(1);
    cheap_closed.is_open = false;

    let candidates = [cheap_open, expensive, cheap_closed]
        .into_iter()
        .map(|place| Candidate::new(place).with_category("Restaurant"))
        .collect();
    let (engine, _) = seeded_engine(candidates);

    let bundle = engine.search(
        &SearchRequest::new("restaurant pas cher ce soir")
            .with_location(ORIGIN.latitude, ORIGIN.longitude),
    );

    let ids: Vec<i64> = bundle.results.iter().map(|r| r.candidate.place.id).collect();
    assert_eq!(ids, vec![1]);
    assert_eq!(bundle.filters_applied.get("price_level"), Some(&serde_json::json!(1)));
    assert_eq!(bundle.filters_applied.get("open_now"), Some(&serde_json::json!(true)));
}

#[test]
fn emergency_prefers_verified_well_rated_hospital() {
    let mut verified = place_at(1, "CHU Sylvanus Olympio", 1200.0);
    verified.is_verified = true;
    verified.verification_level = 2;
    verified.rating = 4.5;

    let mut nearby = place_at(2, "Clinique de Bè", 300.0);
    nearby.rating = 3.0;

    let candidates = vec![
        Candidate::new(nearby).with_category("Hôpital"),
        Candidate::new(verified).with_category("Hôpital"),
    ];
    let (engine, sink) = seeded_engine(candidates);

    let bundle = engine.search(
        &SearchRequest::new("urgence hôpital").with_location(ORIGIN.latitude, ORIGIN.longitude),
    );

    assert_eq!(bundle.intent, Intent::Emergency);
    assert_eq!(bundle.results.len(), 2);
    assert_eq!(bundle.results[0].candidate.place.id, 1);
    assert!(bundle.results[0].relevance_score > bundle.results[1].relevance_score);
    assert!(bundle.response.contains("**CHU Sylvanus Olympio**"));
    assert_eq!(sink.logs()[0].intent, Intent::Emergency);
}

#[test]
fn radius_excludes_far_places() {
    let candidates = vec![
        Candidate::new(place_at(1, "Bar Le Palmier", 400.0)).with_category("Bar"),
        Candidate::new(place_at(2, "Bar La Lagune", 6000.0)).with_category("Bar"),
    ];
    let (engine, _) = seeded_engine(candidates);

    let bundle = engine.search(
        &SearchRequest::new("un bar")
            .with_location(ORIGIN.latitude, ORIGIN.longitude)
            .with_radius(5000.0),
    );

    assert_eq!(bundle.total_results, 1);
    assert_eq!(bundle.results[0].candidate.place.id, 1);
    let distance = bundle.results[0].candidate.distance.unwrap();
    assert!((distance - 400.0).abs() < 1.0, "{distance}");
}

#[test]
fn limit_caps_returned_results() {
    let candidates = (1..=8)
        .map(|id| {
            Candidate::new(place_at(id, &format!("Boutique {id}"), id as f64 * 100.0))
                .with_category("Boutique")
        })
        .collect();
    let (engine, sink) = seeded_engine(candidates);

    let bundle = engine.search(
        &SearchRequest::new("boutique")
            .with_location(ORIGIN.latitude, ORIGIN.longitude)
            .with_limit(3),
    );

    assert_eq!(bundle.results.len(), 3);
    assert_eq!(sink.logs()[0].result_ids.len(), 3);
}

#[test]
fn no_candidates_yields_a_no_results_reply() {
    let (engine, sink) = seeded_engine(Vec::new());

    let bundle = engine.search(&SearchRequest::new("cinéma"));

    assert!(bundle.results.is_empty());
    assert_eq!(bundle.total_results, 0);
    assert!(Template::NoResults.variants().contains(&bundle.response.as_str()));
    assert!(bundle.suggestions.is_empty());
    assert_eq!(sink.logs()[0].result_count, 0);
}

#[test]
fn single_result_has_no_more_options_fragment() {
    let results = tchaller::search::RelevanceScorer::new().rank(vec![Candidate::new(place_at(
        1,
        "Pharmacie du Boulevard",
        200.0,
    ))
    .with_category("Pharmacie")]);
    let entities = Default::default();
    let ctx = SynthesisContext {
        intent: Intent::SearchPlace,
        entities: &entities,
        results: &results,
    };

    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let fragments = ResponseSynthesizer::new().compose(&ctx, &mut rng);
        assert!(fragments.iter().all(|f| f.slot != Slot::MoreOptions));
    }
}

#[test]
fn datastore_failure_degrades_to_no_results() {
    let sink = Arc::new(MemoryLogSink::new());
    let engine = SearchEngine::new(Arc::new(FailingSource), sink.clone());

    let bundle = engine.search(&SearchRequest::new("pharmacie"));

    assert!(bundle.results.is_empty());
    assert!(Template::NoResults.variants().contains(&bundle.response.as_str()));
    let logs = sink.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].result_count, 0);
}

#[test]
fn logging_failure_does_not_affect_the_reply() {
    let cafe = Candidate::new(place_at(1, "Café Nyékonakpoè", 100.0)).with_category("Café");
    let engine = SearchEngine::new(
        Arc::new(InMemorySource::new(vec![cafe])),
        Arc::new(FailingSink),
    );

    let bundle = engine
        .search(&SearchRequest::new("café").with_location(ORIGIN.latitude, ORIGIN.longitude));

    assert_eq!(bundle.results.len(), 1);
    assert!(bundle.response.contains("Café Nyékonakpoè"));
}

#[test]
fn unrecognized_query_falls_back_to_default_intent() {
    let (engine, _) = seeded_engine(Vec::new());

    let bundle = engine.search(&SearchRequest::new("xyzzy plugh"));

    assert_eq!(bundle.intent, Intent::DEFAULT);
    assert!(bundle.entities.is_empty());
}
