// Conversational query analysis
//
// *La Question* (The Question) - Turn free French text into an intent and typed entities

use crate::search::normalize::normalize;
use crate::search::rules::{EntityKind, Intent, RuleSet};
use crate::search::types::Entities;
use std::sync::Arc;

/// Classify a normalized query.
///
/// Intents are tried in declaration order, and patterns within an intent in
/// declaration order; the first match wins. Falls back to
/// [`Intent::DEFAULT`] when nothing matches.
pub fn classify_intent(rules: &RuleSet, normalized: &str) -> Intent {
    rules
        .intents
        .first_match(normalized)
        .map(|(intent, _)| intent)
        .unwrap_or(Intent::DEFAULT)
}

/// Extract at most one entity per category from a normalized query.
///
/// Categories are independent of each other and of the intent. Within a
/// category the first pattern in declaration order that matches wins, even
/// when a later pattern would match a longer span.
pub fn extract_entities(rules: &RuleSet, normalized: &str) -> Entities {
    EntityKind::ALL
        .iter()
        .filter_map(|kind| {
            rules
                .entities
                .first_match_for(*kind, normalized)
                .map(|m| (*kind, m.as_str().to_string()))
        })
        .collect()
}

/// Result of analyzing one raw query
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedQuery {
    /// Original query text
    pub original: String,

    /// Normalized query text
    pub normalized: String,

    /// Classified intent
    pub intent: Intent,

    /// Extracted entities
    pub entities: Entities,
}

impl AnalyzedQuery {
    /// Extracted value for a category
    pub fn entity(&self, kind: EntityKind) -> Option<&str> {
        self.entities.get(&kind).map(String::as_str)
    }
}

/// Normalizer, intent classifier and entity extractor behind one call
#[derive(Debug, Clone)]
pub struct QueryAnalyzer {
    rules: Arc<RuleSet>,
}

impl QueryAnalyzer {
    /// Analyzer over the built-in rule tables
    pub fn new() -> Self {
        Self::with_rules(RuleSet::shared())
    }

    /// Analyzer over custom rule tables
    pub fn with_rules(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Rule tables in use
    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Analyze a raw query
    pub fn analyze(&self, raw: &str) -> AnalyzedQuery {
        let normalized = normalize(raw);
        let intent = classify_intent(&self.rules, &normalized);
        let entities = extract_entities(&self.rules, &normalized);

        tracing::debug!(
            query = %normalized,
            intent = %intent,
            entities = entities.len(),
            "Analyzed query"
        );

        AnalyzedQuery {
            original: raw.to_string(),
            normalized,
            intent,
            entities,
        }
    }
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
