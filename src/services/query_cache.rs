// Query result cache
//
// Per-table shards with TTL expiry. Entries are immutable once written and
// are only replaced wholesale by a fresh execution. Expiry is lazy: an entry
// older than the TTL is evicted on the read that observes it.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Cached result of one successful execution
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub execution_time_ms: u64,
    created_at: Instant,
}

impl CacheEntry {
    pub fn new(rows: Vec<Value>, columns: Vec<String>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            row_count,
            columns,
            execution_time_ms,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

type Shard = Arc<Mutex<HashMap<String, CacheEntry>>>;

/// Cache statistics
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Result cache keyed by (table, normalized query).
///
/// One shard per table identity so concurrent sessions on different tables
/// never contend; the outer map lock is held only to locate a shard.
pub struct QueryResultCache {
    shards: RwLock<HashMap<String, Shard>>,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl QueryResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            ttl,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Create with the default 1 hour TTL
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(3600))
    }

    /// Stable cache key: SHA-256 of the table and the normalized query, so
    /// textually different but whitespace/case-equivalent queries share an
    /// entry.
    pub fn cache_key(table: &str, query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(table.as_bytes());
        hasher.update(b":");
        hasher.update(Self::normalize_query(query).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Trim, lower-case, and collapse internal whitespace
    pub fn normalize_query(query: &str) -> String {
        query
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Get a cached result if present and not expired
    pub fn get(&self, table: &str, query: &str) -> Option<CacheEntry> {
        let key = Self::cache_key(table, query);

        let shard = {
            let shards = self.shards.read().unwrap();
            shards.get(table).cloned()
        };

        let Some(shard) = shard else {
            self.stats.lock().unwrap().misses += 1;
            return None;
        };

        let mut entries = shard.lock().unwrap();
        match entries.get(&key) {
            Some(entry) if entry.is_expired(self.ttl) => {
                entries.remove(&key);
                let mut stats = self.stats.lock().unwrap();
                stats.misses += 1;
                stats.expirations += 1;
                tracing::debug!("Cache entry expired for table {}", table);
                None
            }
            Some(entry) => {
                self.stats.lock().unwrap().hits += 1;
                tracing::debug!("Cache hit for table {}", table);
                Some(entry.clone())
            }
            None => {
                self.stats.lock().unwrap().misses += 1;
                tracing::debug!("Cache miss for table {}", table);
                None
            }
        }
    }

    /// Store a result, replacing any existing entry for the same key
    pub fn put(&self, table: &str, query: &str, entry: CacheEntry) {
        let key = Self::cache_key(table, query);
        let shard = self.shard_for(table);
        let mut entries = shard.lock().unwrap();
        entries.insert(key, entry);
        tracing::debug!(
            "Cached result for table {} ({} entries in shard)",
            table,
            entries.len()
        );
    }

    /// Drop all entries derived from one table, or everything when `None`.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, table: Option<&str>) -> usize {
        let mut shards = self.shards.write().unwrap();
        let removed = match table {
            Some(table) => shards
                .remove(table)
                .map(|shard| shard.lock().unwrap().len())
                .unwrap_or(0),
            None => {
                let total = shards
                    .values()
                    .map(|shard| shard.lock().unwrap().len())
                    .sum();
                shards.clear();
                total
            }
        };

        if removed > 0 {
            self.stats.lock().unwrap().invalidations += removed as u64;
            tracing::info!("Invalidated {} cache entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().unwrap().clone()
    }

    /// Total number of cached entries across all tables
    pub fn size(&self) -> usize {
        let shards = self.shards.read().unwrap();
        shards
            .values()
            .map(|shard| shard.lock().unwrap().len())
            .sum()
    }

    fn shard_for(&self, table: &str) -> Shard {
        // Fast path: shard already exists (read lock)
        {
            let shards = self.shards.read().unwrap();
            if let Some(shard) = shards.get(table) {
                return shard.clone();
            }
        }

        // Slow path: create the shard (write lock), re-checking in case
        // another task created it while we were waiting
        let mut shards = self.shards.write().unwrap();
        shards
            .entry(table.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(rows: Vec<Value>) -> CacheEntry {
        CacheEntry::new(rows, vec!["id".to_string(), "name".to_string()], 12)
    }

    #[test]
    fn test_put_and_get() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put(
            "csv_1_a",
            "SELECT * FROM csv_1_a",
            entry(vec![json!({"id": 1, "name": "Alice"})]),
        );

        let cached = cache.get("csv_1_a", "SELECT * FROM csv_1_a");
        assert!(cached.is_some());
        assert_eq!(cached.unwrap().row_count, 1);
    }

    #[test]
    fn test_miss() {
        let cache = QueryResultCache::with_default_ttl();
        assert!(cache.get("csv_1_a", "SELECT 1").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_normalized_queries_share_an_entry() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT * FROM csv_1_a", entry(vec![json!({"id": 1})]));

        // Different whitespace and casing, same normalized form
        assert!(cache.get("csv_1_a", "  select   *\n FROM csv_1_a ").is_some());
        assert_eq!(
            QueryResultCache::cache_key("csv_1_a", "SELECT * FROM csv_1_a"),
            QueryResultCache::cache_key("csv_1_a", "select  *  from   csv_1_a")
        );
    }

    #[test]
    fn test_same_query_different_table_is_distinct() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));
        assert!(cache.get("csv_2_b", "SELECT 1").is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_evicted() {
        let cache = QueryResultCache::new(Duration::from_millis(40));
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));
        assert!(cache.get("csv_1_a", "SELECT 1").is_some());

        std::thread::sleep(Duration::from_millis(60));

        assert!(cache.get("csv_1_a", "SELECT 1").is_none());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));
        cache.put(
            "csv_1_a",
            "SELECT 1",
            entry(vec![json!({"id": 2}), json!({"id": 3})]),
        );

        let cached = cache.get("csv_1_a", "SELECT 1").unwrap();
        assert_eq!(cached.row_count, 2);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_invalidate_single_table() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));
        cache.put("csv_1_a", "SELECT 2", entry(vec![json!({"id": 2})]));
        cache.put("csv_2_b", "SELECT 1", entry(vec![json!({"id": 3})]));

        assert_eq!(cache.invalidate(Some("csv_1_a")), 2);
        assert!(cache.get("csv_1_a", "SELECT 1").is_none());
        assert!(cache.get("csv_2_b", "SELECT 1").is_some());
    }

    #[test]
    fn test_invalidate_everything() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));
        cache.put("csv_2_b", "SELECT 1", entry(vec![json!({"id": 2})]));

        assert_eq!(cache.invalidate(None), 2);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_stats() {
        let cache = QueryResultCache::with_default_ttl();
        cache.put("csv_1_a", "SELECT 1", entry(vec![json!({"id": 1})]));

        cache.get("csv_1_a", "SELECT 1"); // hit
        cache.get("csv_1_a", "SELECT 1"); // hit
        cache.get("csv_1_a", "SELECT 2"); // miss

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_ratio() > 0.6);
    }
}
