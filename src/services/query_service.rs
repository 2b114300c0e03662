// Guarded query pipeline
//
// Ties the guard components together: identity check, lexical validation,
// duplicate detection, clause diff against the session's previous query,
// LIMIT enforcement, cache lookup, pooled execution, and the sampling gate.
// Every failure becomes a structured outcome; nothing here returns an error
// to the caller boundary.

use std::sync::Arc;
use std::time::Duration;

use crate::api::middleware::AppError;
use crate::config::Config;
use crate::models::{DatasetQueryRequest, QueryDiff, QueryOutcome};
use crate::services::database::QueryBackend;
use crate::services::diff::QueryDiffTracker;
use crate::services::history::QueryHistoryStore;
use crate::services::query_cache::{CacheEntry, CacheStats, QueryResultCache};
use crate::services::sampler::StratifiedSampler;
use crate::validation::{sanitize_table_identity, SqlValidator};

pub struct QueryGuardService {
    backend: Arc<dyn QueryBackend>,
    cache: QueryResultCache,
    history: QueryHistoryStore,
    max_rows: u64,
    timeout_secs: u64,
    sampling_enabled: bool,
    max_sample_rows: usize,
    sampling_row_threshold: usize,
}

impl QueryGuardService {
    pub fn new(backend: Arc<dyn QueryBackend>, config: &Config) -> Self {
        Self {
            backend,
            cache: QueryResultCache::new(Duration::from_secs(config.cache.ttl_secs)),
            history: QueryHistoryStore::new(),
            max_rows: config.query.max_rows,
            timeout_secs: config.query.timeout_secs,
            sampling_enabled: config.sampling.enabled,
            max_sample_rows: config.sampling.max_sample_rows,
            sampling_row_threshold: config.sampling.row_threshold,
        }
    }

    /// Run one guarded query for a dataset.
    pub async fn execute(&self, dataset_id: &str, request: &DatasetQueryRequest) -> QueryOutcome {
        let table = sanitize_table_identity(dataset_id);
        let query = request.query.trim().to_string();

        if let Some(explanation) = &request.explanation {
            tracing::debug!("Query rationale for {}: {}", table, explanation);
        }

        if request.table_name != table {
            let err = AppError::TableMismatch(format!(
                "Expected table '{}' for this dataset, got '{}'",
                table, request.table_name
            ));
            return self.fail_before_history(&table, &query, err);
        }

        if let Err(validation) = SqlValidator::validate(&query) {
            return self.fail_before_history(&table, &query, AppError::Validation(validation));
        }

        // Duplicate check, predecessor fetch, and append happen atomically
        // under the table's history lock
        let ticket = match self.history.begin(&table, &query) {
            Ok(ticket) => ticket,
            Err(err) => {
                let query_number = self.history.len(&table) + 1;
                let diff = QueryDiffTracker::compare(self.history.last(&table).as_deref(), &query);
                return QueryOutcome::failed(err.to_string(), err.suggestion(), query_number, diff);
            }
        };

        let diff = QueryDiffTracker::compare(ticket.previous.as_deref(), &query);
        if let Some(d) = &diff {
            if !d.critical_changes.is_empty() {
                tracing::warn!(
                    "Query #{} on {} has critical changes: {:?}",
                    ticket.query_number,
                    table,
                    d.critical_changes
                );
            }
        }

        let bounded_sql = SqlValidator::ensure_limit(&query, self.max_rows);

        if let Some(entry) = self.cache.get(&table, &bounded_sql) {
            return self.finish(
                entry.rows,
                entry.columns,
                entry.execution_time_ms,
                true,
                diff,
                ticket.query_number,
            );
        }

        match self.backend.execute_query(&bounded_sql, self.timeout_secs).await {
            Ok(result) => {
                self.cache.put(
                    &table,
                    &bounded_sql,
                    CacheEntry::new(
                        result.rows.clone(),
                        result.columns.clone(),
                        result.execution_time_ms,
                    ),
                );
                tracing::info!(
                    "Query #{} on {} returned {} rows in {}ms",
                    ticket.query_number,
                    table,
                    result.row_count,
                    result.execution_time_ms
                );
                self.finish(
                    result.rows,
                    result.columns,
                    result.execution_time_ms,
                    false,
                    diff,
                    ticket.query_number,
                )
            }
            Err(err) => {
                QueryOutcome::failed(err.to_string(), err.suggestion(), ticket.query_number, diff)
            }
        }
    }

    /// Failure ahead of the history append: the attempt gets the number it
    /// would have had, but is not recorded
    fn fail_before_history(&self, table: &str, query: &str, err: AppError) -> QueryOutcome {
        let query_number = self.history.len(table) + 1;
        let diff = QueryDiffTracker::compare(self.history.last(table).as_deref(), query);
        QueryOutcome::failed(err.to_string(), err.suggestion(), query_number, diff)
    }

    fn finish(
        &self,
        rows: Vec<serde_json::Value>,
        columns: Vec<String>,
        execution_time_ms: u64,
        from_cache: bool,
        diff: Option<QueryDiff>,
        query_number: usize,
    ) -> QueryOutcome {
        if self.sampling_enabled && rows.len() > self.sampling_row_threshold {
            let sample = StratifiedSampler::sample(&rows, &columns, self.max_sample_rows);
            QueryOutcome::sampled(sample, execution_time_ms, from_cache, diff, query_number)
        } else {
            QueryOutcome::executed(
                rows,
                columns,
                execution_time_ms,
                from_cache,
                diff,
                query_number,
            )
        }
    }

    /// Drop cached results for a dataset. Returns entries removed.
    pub fn invalidate(&self, dataset_id: &str) -> usize {
        let table = sanitize_table_identity(dataset_id);
        self.cache.invalidate(Some(&table))
    }

    /// Reset a dataset's session history. Returns entries removed.
    pub fn reset_session(&self, dataset_id: &str) -> usize {
        let table = sanitize_table_identity(dataset_id);
        self.history.clear(&table)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
