// Search orchestration
//
// *Le Moteur* (The Engine) - normalize, classify, extract, plan, fetch, rank, reply, log

use crate::search::planner::QueryPlanner;
use crate::search::query::QueryAnalyzer;
use crate::search::ranking::{RankingWeights, RelevanceScorer};
use crate::search::response::{ResponseConfig, ResponseSynthesizer, SynthesisContext};
use crate::search::rules::RuleSet;
use crate::search::source::{CandidateSource, SearchLogSink};
use crate::search::types::{RankedResult, ResponseBundle, SearchLog, SearchRequest};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum number of category suggestions
const MAX_CATEGORY_SUGGESTIONS: usize = 3;

/// Conversational search engine
///
/// Holds only read-only state; one engine serves any number of concurrent
/// calls.
pub struct SearchEngine {
    analyzer: QueryAnalyzer,
    planner: QueryPlanner,
    scorer: RelevanceScorer,
    synthesizer: ResponseSynthesizer,
    source: Arc<dyn CandidateSource>,
    log_sink: Arc<dyn SearchLogSink>,
}

impl SearchEngine {
    /// Engine over the built-in rule tables and default weights
    pub fn new(source: Arc<dyn CandidateSource>, log_sink: Arc<dyn SearchLogSink>) -> Self {
        let rules = RuleSet::shared();
        Self {
            analyzer: QueryAnalyzer::with_rules(Arc::clone(&rules)),
            planner: QueryPlanner::with_rules(rules),
            scorer: RelevanceScorer::new(),
            synthesizer: ResponseSynthesizer::new(),
            source,
            log_sink,
        }
    }

    /// Replace the rule tables
    pub fn with_rules(mut self, rules: Arc<RuleSet>) -> Self {
        self.analyzer = QueryAnalyzer::with_rules(Arc::clone(&rules));
        self.planner = QueryPlanner::with_rules(rules);
        self
    }

    /// Replace the ranking weights
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.scorer = RelevanceScorer::with_weights(weights);
        self
    }

    /// Replace the response settings
    pub fn with_response_config(mut self, config: ResponseConfig) -> Self {
        self.synthesizer = ResponseSynthesizer::with_config(config);
        self
    }

    /// Run one search.
    ///
    /// Never fails: a datastore error degrades to a "no results" reply and a
    /// logging error is reported through `tracing` only. Phrasing uses a
    /// fresh RNG, seeded from the response settings when a seed is set.
    pub fn search(&self, request: &SearchRequest) -> ResponseBundle {
        let mut rng = match self.synthesizer.config().seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.search_with_rng(request, &mut rng)
    }

    /// Run one search with a caller-provided RNG for phrasing
    pub fn search_with_rng<R: Rng + ?Sized>(
        &self,
        request: &SearchRequest,
        rng: &mut R,
    ) -> ResponseBundle {
        let started = Instant::now();
        let request = request.sanitized();

        let analyzed = self.analyzer.analyze(&request.query);
        let plan = self
            .planner
            .plan(&request, &analyzed.normalized, &analyzed.entities);

        let candidates = match self.source.fetch(&plan) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    error = %e,
                    query = %analyzed.normalized,
                    "Candidate fetch failed, answering with no results"
                );
                Vec::new()
            }
        };
        let total_results = candidates.len();

        let mut results = self.scorer.rank(candidates);
        results.truncate(request.limit);

        let response = self.synthesizer.synthesize(
            &SynthesisContext {
                intent: analyzed.intent,
                entities: &analyzed.entities,
                results: &results,
            },
            rng,
        );
        let suggestions = suggestions(&results, request.reference_point().is_some());
        let filters_applied = plan.filters_applied();

        let log = SearchLog {
            query: request.query.clone(),
            normalized_query: analyzed.normalized.clone(),
            intent: analyzed.intent,
            entities: analyzed.entities.clone(),
            result_count: total_results,
            result_ids: results.iter().map(|r| r.candidate.place.id).collect(),
            elapsed_ms: elapsed_ms(started),
            user_id: request.user_id,
            location: request.reference_point(),
            radius: request.radius,
            filters: filters_applied.clone(),
        };
        if let Err(e) = self.log_sink.record(&log) {
            warn!(error = %e, "Failed to record search log");
        }

        let elapsed_ms = elapsed_ms(started);
        debug!(
            intent = %analyzed.intent,
            total_results,
            returned = results.len(),
            elapsed_ms,
            "Search completed"
        );

        ResponseBundle {
            query: request.query,
            normalized_query: analyzed.normalized,
            intent: analyzed.intent,
            entities: analyzed.entities,
            results,
            total_results,
            elapsed_ms,
            response,
            suggestions,
            filters_applied,
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Follow-up queries: the categories seen in the results, then location-based ideas
fn suggestions(results: &[RankedResult], located: bool) -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for result in results {
        if let Some(name) = result.candidate.category_name.as_deref() {
            let name = name.to_lowercase();
            if !categories.contains(&name) {
                categories.push(name);
            }
        }
        if categories.len() == MAX_CATEGORY_SUGGESTIONS {
            break;
        }
    }

    let mut suggestions: Vec<String> = categories
        .into_iter()
        .map(|name| format!("Voir plus de {name}"))
        .collect();
    if located {
        suggestions.push("Activités près de moi".to_string());
        suggestions.push("Activités ouvertes maintenant".to_string());
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::rules::Intent;
    use crate::search::source::{InMemorySource, MemoryLogSink};
    use crate::search::types::{Candidate, Place};

    fn engine(candidates: Vec<Candidate>) -> (SearchEngine, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::new());
        let engine = SearchEngine::new(Arc::new(InMemorySource::new(candidates)), sink.clone())
            .with_response_config(ResponseConfig {
                seed: Some(42),
                ..Default::default()
            });
        (engine, sink)
    }

    #[test]
    fn test_search_returns_bundle_and_logs_once() {
        let pharmacy = Candidate::new(Place::new(1, "Pharmacie du Boulevard", 6.171, 1.231))
            .with_category("Pharmacie");
        let (engine, sink) = engine(vec![pharmacy]);

        let bundle = engine.search(&SearchRequest::new("Pharmacie").with_location(6.17, 1.23));

        assert_eq!(bundle.intent, Intent::SearchPlace);
        assert_eq!(bundle.normalized_query, "pharmacie");
        assert_eq!(bundle.total_results, 1);
        assert_eq!(bundle.results.len(), 1);
        assert!(bundle.response.contains("Pharmacie du Boulevard"));
        assert_eq!(
            bundle.suggestions,
            vec![
                "Voir plus de pharmacie".to_string(),
                "Activités près de moi".to_string(),
                "Activités ouvertes maintenant".to_string(),
            ]
        );

        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].result_ids, vec![1]);
        assert_eq!(logs[0].intent, Intent::SearchPlace);
    }

    #[test]
    fn test_seeded_engine_is_reproducible() {
        let candidates = vec![
            Candidate::new(Place::new(1, "Bar Le Palmier", 6.171, 1.231)).with_category("Bar"),
            Candidate::new(Place::new(2, "Bar La Lagune", 6.172, 1.232)).with_category("Bar"),
        ];
        let (engine, _) = engine(candidates);
        let request = SearchRequest::new("un bar").with_location(6.17, 1.23);

        assert_eq!(engine.search(&request).response, engine.search(&request).response);
    }

    #[test]
    fn test_suggestions_deduplicate_categories() {
        let results: Vec<RankedResult> = ["Bar", "bar", "Restaurant", "Café", "Banque"]
            .iter()
            .enumerate()
            .map(|(i, category)| RankedResult {
                candidate: Candidate::new(Place::new(i as i64, "x", 0.0, 0.0))
                    .with_category(*category),
                relevance_score: 0.0,
            })
            .collect();

        assert_eq!(
            suggestions(&results, false),
            vec!["Voir plus de bar", "Voir plus de restaurant", "Voir plus de café"]
        );
    }
}
