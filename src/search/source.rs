// Search collaborators
//
// The engine reads candidates from a [`CandidateSource`] and writes one audit
// record per call to a [`SearchLogSink`]. In-memory implementations live here
// so the pipeline runs without a database.

use crate::search::geo::haversine_m;
use crate::search::planner::QueryPlan;
use crate::search::types::{Candidate, SearchLog};
use std::sync::Mutex;

/// Candidate fetch failure
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    /// The query could not be executed
    #[error("Query failed: {0}")]
    Query(String),

    /// A row could not be decoded
    #[error("Invalid row: {0}")]
    Decode(String),

    /// The datastore is unreachable
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),
}

/// Audit log write failure
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The record could not be written
    #[error("Failed to write search log: {0}")]
    Write(String),

    /// The record could not be encoded
    #[error("Failed to encode search log: {0}")]
    Encode(String),
}

/// Executes query plans against a place datastore
pub trait CandidateSource: Send + Sync {
    /// Fetch the candidates satisfying `plan`, in plan order, at most `plan.limit`
    fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Candidate>, DatastoreError>;
}

/// Persists search audit records
pub trait SearchLogSink: Send + Sync {
    /// Write one record
    fn record(&self, log: &SearchLog) -> Result<(), LoggingError>;
}

/// A candidate source over a fixed list of candidates
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    candidates: Vec<Candidate>,
}

impl InMemorySource {
    /// Source over the given candidates
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// Number of stored candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the source is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl CandidateSource for InMemorySource {
    fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Candidate>, DatastoreError> {
        let mut matched: Vec<Candidate> = self
            .candidates
            .iter()
            .map(|candidate| {
                let mut candidate = candidate.clone();
                candidate.distance = plan
                    .reference
                    .map(|center| haversine_m(center, candidate.place.location()));
                candidate
            })
            .filter(|candidate| plan.matches(candidate))
            .collect();

        matched.sort_by(|a, b| plan.compare(a, b));
        matched.truncate(plan.limit);
        Ok(matched)
    }
}

/// A log sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    logs: Mutex<Vec<SearchLog>>,
}

impl MemoryLogSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far
    pub fn logs(&self) -> Vec<SearchLog> {
        self.logs
            .lock()
            .map(|logs| logs.clone())
            .unwrap_or_default()
    }
}

impl SearchLogSink for MemoryLogSink {
    fn record(&self, log: &SearchLog) -> Result<(), LoggingError> {
        let mut logs = self
            .logs
            .lock()
            .map_err(|e| LoggingError::Write(e.to_string()))?;
        logs.push(log.clone());
        Ok(())
    }
}

/// A log sink that drops every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl SearchLogSink for NullLogSink {
    fn record(&self, _log: &SearchLog) -> Result<(), LoggingError> {
        Ok(())
    }
}
