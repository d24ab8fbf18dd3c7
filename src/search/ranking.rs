// Relevance scoring
//
// *Le Classement* (The Ranking) - Weighted multi-factor score over plan candidates

use crate::search::types::{Candidate, RankedResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named, configurable ranking weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// `(max distance in meters, bonus)` tiers, ascending by distance
    pub distance_tiers: Vec<(f64, f64)>,

    /// Bonus for a known distance beyond the last tier
    pub distance_floor_bonus: f64,

    /// Base bonus for verified places
    pub verified_bonus: f64,

    /// Extra bonus per verification level (verified places only)
    pub verification_level_bonus: f64,

    /// Bonus for open places
    pub open_bonus: f64,

    /// Multiplier applied to the rating
    pub rating_weight: f64,

    /// Weight per review, up to `review_cap` reviews
    pub review_weight: f64,

    /// Review count cap
    pub review_cap: u32,

    /// Weight per view, up to `view_cap` views
    pub view_weight: f64,

    /// View count cap
    pub view_cap: u32,

    /// Weight per search hit, up to `search_cap` hits
    pub search_weight: f64,

    /// Search hit cap
    pub search_cap: u32,

    /// Age in days below which a place counts as recent
    pub recent_days: i64,

    /// Bonus for recent places
    pub recent_bonus: f64,

    /// Age in days below which a place counts as fresh
    pub fresh_days: i64,

    /// Bonus for fresh (but not recent) places
    pub fresh_bonus: f64,

    /// Bonus per completed profile item
    pub completeness_bonus: f64,

    /// Description length (characters) above which it counts as complete
    pub description_min_chars: usize,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            distance_tiers: vec![(500.0, 100.0), (1000.0, 80.0), (2000.0, 60.0)],
            distance_floor_bonus: 40.0,
            verified_bonus: 50.0,
            verification_level_bonus: 10.0,
            open_bonus: 30.0,
            rating_weight: 10.0,
            review_weight: 0.5,
            review_cap: 100,
            view_weight: 0.1,
            view_cap: 1000,
            search_weight: 0.2,
            search_cap: 500,
            recent_days: 30,
            recent_bonus: 10.0,
            fresh_days: 90,
            fresh_bonus: 5.0,
            completeness_bonus: 5.0,
            description_min_chars: 50,
        }
    }
}

impl RankingWeights {
    /// Check that the weights keep the score monotonic
    pub fn validate(&self) -> Result<(), String> {
        let mut previous: Option<(f64, f64)> = None;
        for &(max_m, bonus) in &self.distance_tiers {
            if !(max_m.is_finite() && max_m > 0.0) {
                return Err(format!("distance tier bound {max_m} must be positive"));
            }
            if let Some((prev_m, prev_bonus)) = previous {
                if max_m <= prev_m {
                    return Err("distance tiers must be sorted by ascending distance".to_string());
                }
                if bonus > prev_bonus {
                    return Err("distance tier bonuses must not increase with distance".to_string());
                }
            }
            previous = Some((max_m, bonus));
        }
        if let Some((_, last_bonus)) = previous {
            if self.distance_floor_bonus > last_bonus {
                return Err("distance floor bonus must not exceed the last tier bonus".to_string());
            }
        }
        if self.rating_weight < 0.0 {
            return Err("rating weight must not be negative".to_string());
        }
        if self.fresh_days < self.recent_days {
            return Err("fresh_days must be at least recent_days".to_string());
        }
        Ok(())
    }
}

/// Per-factor contributions to a relevance score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Distance tier bonus
    pub distance: f64,

    /// Verification bonus
    pub verification: f64,

    /// Open-now bonus
    pub open: f64,

    /// Rating contribution
    pub rating: f64,

    /// Reviews, views and search hits
    pub popularity: f64,

    /// Recency bonus
    pub recency: f64,

    /// Profile completeness bonus
    pub completeness: f64,
}

impl ScoreBreakdown {
    /// Sum of every contribution
    #[must_use]
    pub fn total(&self) -> f64 {
        self.distance
            + self.verification
            + self.open
            + self.rating
            + self.popularity
            + self.recency
            + self.completeness
    }
}

/// Scores and orders candidates
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    weights: RankingWeights,
}

impl RelevanceScorer {
    /// Scorer with default weights
    pub fn new() -> Self {
        Self::default()
    }

    /// Scorer with custom weights
    pub fn with_weights(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Weights in use
    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    /// Score one candidate at instant `now`
    pub fn score_at(&self, candidate: &Candidate, now: DateTime<Utc>) -> ScoreBreakdown {
        let w = &self.weights;
        let place = &candidate.place;

        let distance = candidate
            .distance
            .map(|meters| {
                w.distance_tiers
                    .iter()
                    .find(|(max_m, _)| meters < *max_m)
                    .map(|(_, bonus)| *bonus)
                    .unwrap_or(w.distance_floor_bonus)
            })
            .unwrap_or(0.0);

        let verification = if place.is_verified {
            w.verified_bonus + w.verification_level_bonus * f64::from(place.verification_level)
        } else {
            0.0
        };

        let open = if place.is_open { w.open_bonus } else { 0.0 };

        let rating = place.rating * w.rating_weight;

        let popularity = f64::from(place.review_count.min(w.review_cap)) * w.review_weight
            + f64::from(place.view_count.min(w.view_cap)) * w.view_weight
            + f64::from(place.search_count.min(w.search_cap)) * w.search_weight;

        let age_days = (now - place.created_at).num_days();
        let recency = if age_days < w.recent_days {
            w.recent_bonus
        } else if age_days < w.fresh_days {
            w.fresh_bonus
        } else {
            0.0
        };

        let completed = [
            place.has_cover_image(),
            place.description_len() > w.description_min_chars,
            place.has_opening_hours(),
            place.has_contact_channel(),
        ]
        .iter()
        .filter(|done| **done)
        .count();
        let completeness = completed as f64 * w.completeness_bonus;

        ScoreBreakdown {
            distance,
            verification,
            open,
            rating,
            popularity,
            recency,
            completeness,
        }
    }

    /// Score and sort candidates, best first, at instant `now`.
    ///
    /// The sort is stable: candidates with equal scores keep the order the
    /// datastore returned them in.
    pub fn rank_at(&self, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = candidates
            .into_iter()
            .map(|candidate| {
                let relevance_score = self.score_at(&candidate, now).total();
                RankedResult {
                    candidate,
                    relevance_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        ranked
    }

    /// Score and sort candidates at the current instant
    pub fn rank(&self, candidates: Vec<Candidate>) -> Vec<RankedResult> {
        self.rank_at(candidates, Utc::now())
    }
}
