// Search audit log and analytics

use crate::search::source::{LoggingError, SearchLogSink};
use crate::search::types::SearchLog;
use crate::storage::schema::PlaceStore;
use crate::storage::StorageError;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Result as SqliteResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Window used by [`PlaceStore::analytics`] for popular queries and intents
pub const ANALYTICS_WINDOW_DAYS: i64 = 7;

/// Longest accepted analytics window, in days
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// A query and how often it was searched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularQuery {
    /// Normalized query text
    pub query: String,

    /// Number of searches
    pub count: u64,
}

/// Aggregate search statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchAnalytics {
    /// Searches ever logged
    pub total_searches: u64,

    /// Distinct requester ids
    pub unique_users: u64,

    /// Most frequent queries over the window
    pub popular_queries: Vec<PopularQuery>,

    /// Search count per intent over the window
    pub search_intents: BTreeMap<String, u64>,

    /// Mean elapsed time in milliseconds
    pub average_response_time_ms: f64,

    /// Share of searches with at least one result, in percent
    pub success_rate: f64,
}

impl PlaceStore {
    /// Append a search log and count a search hit for every returned place
    pub fn insert_search_log(&self, log: &SearchLog) -> Result<i64, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO search_logs (
                query, normalized_query, intent, entities, result_count, result_ids,
                elapsed_ms, user_id, latitude, longitude, radius, filters, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                log.query,
                log.normalized_query,
                log.intent.as_str(),
                serde_json::to_string(&log.entities)?,
                log.result_count as i64,
                serde_json::to_string(&log.result_ids)?,
                log.elapsed_ms,
                log.user_id,
                log.location.map(|p| p.latitude),
                log.location.map(|p| p.longitude),
                log.radius,
                serde_json::to_string(&log.filters)?,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        for place_id in &log.result_ids {
            tx.execute(
                "UPDATE places SET search_count = search_count + 1 WHERE id = ?1",
                params![place_id],
            )?;
        }
        tx.commit()?;

        Ok(id)
    }

    /// Number of logged searches
    pub fn count_search_logs(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM search_logs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most frequent normalized queries over the last `days` days
    ///
    /// `days` must lie in `1..=MAX_WINDOW_DAYS`.
    pub fn popular_queries(
        &self,
        days: i64,
        limit: usize,
    ) -> Result<Vec<PopularQuery>, StorageError> {
        let since = window_start(days)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT normalized_query, COUNT(*) AS count
             FROM search_logs
             WHERE created_at >= ?1
             GROUP BY normalized_query
             ORDER BY count DESC, normalized_query ASC
             LIMIT ?2",
        )?;
        let queries = stmt
            .query_map(params![since, limit], |row| {
                Ok(PopularQuery {
                    query: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(queries)
    }

    /// Search count per intent over the last `days` days
    pub fn intent_counts(&self, days: i64) -> Result<BTreeMap<String, u64>, StorageError> {
        let since = window_start(days)?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT intent, COUNT(*) AS count
             FROM search_logs
             WHERE created_at >= ?1
             GROUP BY intent",
        )?;
        let counts = stmt
            .query_map(params![since], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<SqliteResult<BTreeMap<_, _>>>()?;

        Ok(counts)
    }

    /// Aggregate search statistics
    pub fn analytics(&self) -> Result<SearchAnalytics, StorageError> {
        let (total, unique_users, average, successes) = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT COUNT(*),
                        COUNT(DISTINCT user_id),
                        COALESCE(AVG(elapsed_ms), 0.0),
                        COALESCE(SUM(CASE WHEN result_count > 0 THEN 1 ELSE 0 END), 0)
                 FROM search_logs",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )?
        };

        let success_rate = if total > 0 {
            successes as f64 * 100.0 / total as f64
        } else {
            0.0
        };

        Ok(SearchAnalytics {
            total_searches: total as u64,
            unique_users: unique_users as u64,
            popular_queries: self.popular_queries(ANALYTICS_WINDOW_DAYS, 5)?,
            search_intents: self.intent_counts(ANALYTICS_WINDOW_DAYS)?,
            average_response_time_ms: average,
            success_rate,
        })
    }
}

/// Start of a window of `days` days ending now
///
/// Checked before the connection is locked.
fn window_start(days: i64) -> Result<DateTime<Utc>, StorageError> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(StorageError::InvalidWindow(days));
    }
    Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or(StorageError::InvalidWindow(days))
}

impl SearchLogSink for PlaceStore {
    fn record(&self, log: &SearchLog) -> Result<(), LoggingError> {
        self.insert_search_log(log).map(|_| ()).map_err(|e| match e {
            StorageError::Json(e) => LoggingError::Encode(e.to_string()),
            other => LoggingError::Write(other.to_string()),
        })
    }
}
