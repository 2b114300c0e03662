// Per-table query history
//
// Append-only log of raw queries, one per active analysis session on a
// table. The diff tracker compares against the most recent entry, so
// appends are serialized under one mutex per table identity; the outer map
// lock is held only to locate a shard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::api::middleware::AppError;

/// Position and predecessor of a query admitted into the history
#[derive(Debug, Clone)]
pub struct HistoryTicket {
    /// 1-based position of the query in this table's session
    pub query_number: usize,
    /// The immediately preceding query, if any
    pub previous: Option<String>,
}

type Shard = Arc<Mutex<Vec<String>>>;

/// Process-wide query history, sharded by table identity
pub struct QueryHistoryStore {
    shards: RwLock<HashMap<String, Shard>>,
}

impl QueryHistoryStore {
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a query into a table's history.
    ///
    /// Atomically checks for an exact repeat of the previous query, captures
    /// the predecessor for diffing, and appends. Rejected duplicates are not
    /// appended.
    pub fn begin(&self, table: &str, query: &str) -> Result<HistoryTicket, AppError> {
        let shard = self.shard_for(table);
        let mut entries = shard.lock().unwrap();

        let previous = entries.last().cloned();
        if let Some(prev) = &previous {
            if prev.trim() == query.trim() {
                return Err(AppError::DuplicateQuery(format!(
                    "Query #{} is identical to the previous query for this table",
                    entries.len() + 1
                )));
            }
        }

        entries.push(query.to_string());
        Ok(HistoryTicket {
            query_number: entries.len(),
            previous,
        })
    }

    /// Most recent query for a table, if any
    pub fn last(&self, table: &str) -> Option<String> {
        let shards = self.shards.read().unwrap();
        shards
            .get(table)
            .and_then(|shard| shard.lock().unwrap().last().cloned())
    }

    /// Number of queries recorded for a table
    pub fn len(&self, table: &str) -> usize {
        let shards = self.shards.read().unwrap();
        shards
            .get(table)
            .map(|shard| shard.lock().unwrap().len())
            .unwrap_or(0)
    }

    /// Drop a table's session history. Returns the number of entries removed.
    pub fn clear(&self, table: &str) -> usize {
        let mut shards = self.shards.write().unwrap();
        let removed = shards
            .remove(table)
            .map(|shard| shard.lock().unwrap().len())
            .unwrap_or(0);
        if removed > 0 {
            tracing::info!("Cleared {} history entries for table {}", removed, table);
        }
        removed
    }

    fn shard_for(&self, table: &str) -> Shard {
        {
            let shards = self.shards.read().unwrap();
            if let Some(shard) = shards.get(table) {
                return shard.clone();
            }
        }

        let mut shards = self.shards.write().unwrap();
        shards
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }
}

impl Default for QueryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_query_has_no_previous() {
        let history = QueryHistoryStore::new();
        let ticket = history.begin("csv_1_a", "SELECT 1").unwrap();
        assert_eq!(ticket.query_number, 1);
        assert!(ticket.previous.is_none());
    }

    #[test]
    fn test_successive_queries_are_numbered_and_chained() {
        let history = QueryHistoryStore::new();
        history.begin("csv_1_a", "SELECT 1").unwrap();
        let ticket = history.begin("csv_1_a", "SELECT 2").unwrap();
        assert_eq!(ticket.query_number, 2);
        assert_eq!(ticket.previous.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn test_exact_repeat_is_rejected_and_not_appended() {
        let history = QueryHistoryStore::new();
        history.begin("csv_1_a", "SELECT 1").unwrap();

        let err = history.begin("csv_1_a", "SELECT 1").unwrap_err();
        assert!(matches!(err, AppError::DuplicateQuery(_)));
        assert_eq!(history.len("csv_1_a"), 1);

        // Trimmed comparison: trailing whitespace is still a repeat
        assert!(history.begin("csv_1_a", "  SELECT 1  ").is_err());
    }

    #[test]
    fn test_tables_are_isolated() {
        let history = QueryHistoryStore::new();
        history.begin("csv_1_a", "SELECT 1").unwrap();

        let ticket = history.begin("csv_2_b", "SELECT 1").unwrap();
        assert_eq!(ticket.query_number, 1);
        assert!(ticket.previous.is_none());
    }

    #[test]
    fn test_clear_resets_session() {
        let history = QueryHistoryStore::new();
        history.begin("csv_1_a", "SELECT 1").unwrap();
        history.begin("csv_1_a", "SELECT 2").unwrap();

        assert_eq!(history.clear("csv_1_a"), 2);
        assert_eq!(history.len("csv_1_a"), 0);

        // The same query is admissible again after a clear
        let ticket = history.begin("csv_1_a", "SELECT 2").unwrap();
        assert_eq!(ticket.query_number, 1);
    }
}
