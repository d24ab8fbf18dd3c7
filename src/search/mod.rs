// Conversational search core
//
// *La Recherche* (The Search) - Rule-based query understanding, geospatial planning,
// multi-factor ranking and templated replies

pub mod engine;
pub mod geo;
pub mod normalize;
pub mod planner;
pub mod query;
pub mod ranking;
pub mod response;
pub mod rules;
pub mod source;
pub mod types;

pub use engine::SearchEngine;
pub use planner::{OrderKey, Predicate, PriceTier, QueryPlan, QueryPlanner, SqlValue};
pub use query::{classify_intent, extract_entities, AnalyzedQuery, QueryAnalyzer};
pub use ranking::{RankingWeights, RelevanceScorer, ScoreBreakdown};
pub use response::{ResponseConfig, ResponseSynthesizer, SynthesisContext, Template};
pub use rules::{EntityKind, Intent, RuleSet};
pub use source::{
    CandidateSource, DatastoreError, InMemorySource, LoggingError, MemoryLogSink, NullLogSink,
    SearchLogSink,
};
pub use types::{
    Candidate, Entities, GeoPoint, Place, RankedResult, RequestError, ResponseBundle, SearchFilters,
    SearchLog, SearchRequest,
};
