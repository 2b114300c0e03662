// Backend seam for query execution
use crate::api::middleware::AppError;
use serde_json::Value;

/// Query execution result
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub execution_time_ms: u64,
}

/// Abstraction over the backing relational store.
///
/// The pipeline depends only on this trait; tests run against an in-memory
/// implementation. Implementations must release their connection on every
/// exit path, including timeout.
#[async_trait::async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute a validated, LIMIT-bounded query
    async fn execute_query(&self, sql: &str, timeout_secs: u64) -> Result<QueryResult, AppError>;
}
