// PostgreSQL backend using a deadpool connection pool
use deadpool_postgres::Pool;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_postgres::{NoTls, Row};

use crate::api::middleware::AppError;
use crate::services::database::adapter::{QueryBackend, QueryResult};

pub struct PostgresBackend {
    pool: Pool,
}

impl PostgresBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL rows to JSON objects, keyed by column name
    fn rows_to_json(rows: &[Row]) -> Vec<Value> {
        let mut results = Vec::with_capacity(rows.len());

        for row in rows {
            let mut row_obj = serde_json::Map::new();
            for (idx, column) in row.columns().iter().enumerate() {
                let column_name = column.name();
                let value: Value = match column.type_().name() {
                    "int2" => row
                        .try_get::<_, Option<i16>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    "int4" => row
                        .try_get::<_, Option<i32>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    "int8" => row
                        .try_get::<_, Option<i64>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    "float4" => row
                        .try_get::<_, Option<f32>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    "float8" => row
                        .try_get::<_, Option<f64>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    "bool" => row
                        .try_get::<_, Option<bool>>(idx)
                        .ok()
                        .flatten()
                        .map(|v| json!(v))
                        .unwrap_or(Value::Null),
                    _ => {
                        // TEXT, VARCHAR, NUMERIC, TIMESTAMP, UUID, JSON and
                        // everything else: try a string representation, then
                        // common scalars, then NULL
                        if let Ok(Some(v)) = row.try_get::<_, Option<String>>(idx) {
                            json!(v)
                        } else if let Ok(Some(v)) = row.try_get::<_, Option<i64>>(idx) {
                            json!(v)
                        } else if let Ok(Some(v)) = row.try_get::<_, Option<f64>>(idx) {
                            json!(v)
                        } else if let Ok(Some(v)) = row.try_get::<_, Option<bool>>(idx) {
                            json!(v)
                        } else {
                            Value::Null
                        }
                    }
                };
                row_obj.insert(column_name.to_string(), value);
            }
            results.push(Value::Object(row_obj));
        }

        results
    }
}

#[async_trait::async_trait]
impl QueryBackend for PostgresBackend {
    async fn execute_query(&self, sql: &str, timeout_secs: u64) -> Result<QueryResult, AppError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to get connection from pool: {}", e)))?;

        let cancel_token = client.cancel_token();
        let start_time = Instant::now();

        let query_future = async {
            let stmt = client.prepare(sql).await?;
            let columns: Vec<String> = stmt
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect();
            let rows = client.query(&stmt, &[]).await?;
            Ok::<_, tokio_postgres::Error>((rows, columns))
        };

        let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), query_future).await;

        let (rows, columns) = match outcome {
            Err(_) => {
                // Abort the in-flight statement so the pooled connection is
                // usable again, not merely abandoned mid-query
                if let Err(e) = cancel_token.cancel_query(NoTls).await {
                    tracing::warn!("Failed to cancel timed-out query: {}", e);
                }
                return Err(AppError::Timeout(format!(
                    "Query did not complete within {} seconds",
                    timeout_secs
                )));
            }
            Ok(Err(e)) => {
                let error_details = if let Some(db_error) = e.as_db_error() {
                    format!(
                        "Code: {}, Message: {}",
                        db_error.code().code(),
                        db_error.message()
                    )
                } else {
                    format!("{}", e)
                };
                tracing::error!("Query execution failed: {}", error_details);
                return Err(AppError::Execution(error_details));
            }
            Ok(Ok(result)) => result,
        };

        let json_rows = Self::rows_to_json(&rows);
        let row_count = json_rows.len();
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        Ok(QueryResult {
            rows: json_rows,
            row_count,
            columns,
            execution_time_ms,
        })
    }
}
