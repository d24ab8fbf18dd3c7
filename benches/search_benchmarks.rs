use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use tchaller::search::geo::offset_north;
use tchaller::search::{
    Candidate, GeoPoint, InMemorySource, NullLogSink, Place, QueryAnalyzer, RelevanceScorer,
    SearchEngine, SearchRequest,
};

const ORIGIN: GeoPoint = GeoPoint {
    latitude: 6.17,
    longitude: 1.23,
};

const QUERIES: &[&str] = &[
    "restaurant pas cher ce soir",
    "urgence hôpital",
    "Où trouver une pharmacie ouverte maintenant près de moi ?",
    "quel est le numéro du maquis à Tokoin",
    "je veux manger du poulet braisé",
];

fn candidates(count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| {
            let point = offset_north(ORIGIN, (i % 60) as f64 * 100.0);
            let mut place = Place::new(
                i as i64,
                &format!("Restaurant {i}"),
                point.latitude,
                point.longitude,
            );
            place.rating = (i % 50) as f64 / 10.0;
            place.is_verified = i % 3 == 0;
            place.verification_level = (i % 4) as u8;
            place.price_level = Some((i % 3) as u8 + 1);
            place.review_count = (i * 7 % 150) as u32;
            Candidate::new(place).with_category("Restaurant")
        })
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let analyzer = QueryAnalyzer::new();
    c.bench_function("analyze_queries", |b| {
        b.iter(|| {
            for query in QUERIES {
                black_box(analyzer.analyze(black_box(query)));
            }
        })
    });
}

fn bench_rank(c: &mut Criterion) {
    let scorer = RelevanceScorer::new();
    let pool = candidates(500);
    c.bench_function("rank_500_candidates", |b| {
        b.iter_batched(
            || pool.clone(),
            |pool| black_box(scorer.rank(pool)),
            BatchSize::SmallInput,
        )
    });
}

fn bench_search(c: &mut Criterion) {
    let engine = SearchEngine::new(
        Arc::new(InMemorySource::new(candidates(500))),
        Arc::new(NullLogSink),
    );
    let request = SearchRequest::new("restaurant pas cher ce soir")
        .with_location(ORIGIN.latitude, ORIGIN.longitude)
        .with_limit(20);
    c.bench_function("search_in_memory_500", |b| {
        b.iter(|| black_box(engine.search(black_box(&request))))
    });
}

criterion_group!(benches, bench_analyze, bench_rank, bench_search);
criterion_main!(benches);
