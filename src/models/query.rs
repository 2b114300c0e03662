use serde::{Deserialize, Serialize};

use super::sample::StratifiedSample;

/// Inbound query request from the orchestration layer
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetQueryRequest {
    pub query: String,
    /// Table the caller believes it is querying; must match the canonical
    /// form of the dataset identifier
    pub table_name: String,
    /// Free-text rationale from the agent, logged but not interpreted
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Clause-level diff between the current query and the previous one
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryDiff {
    pub previous: String,
    pub current: String,
    pub unified_diff: String,
    pub critical_changes: Vec<String>,
    pub summary: String,
}

/// Result of one guarded execution, serialized back to the caller.
///
/// Every failure mode is a value, never an HTTP error: the orchestration
/// layer reacts to the structure deterministically.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Cached(ResultPayload),
    Executed(ResultPayload),
    Sampled(SampledPayload),
    Failed(FailedPayload),
}

impl QueryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, QueryOutcome::Failed(_))
    }

    pub fn diff(&self) -> Option<&QueryDiff> {
        match self {
            QueryOutcome::Cached(p) | QueryOutcome::Executed(p) => p.diff.as_ref(),
            QueryOutcome::Sampled(p) => p.diff.as_ref(),
            QueryOutcome::Failed(p) => p.diff.as_ref(),
        }
    }

    pub fn query_number(&self) -> usize {
        match self {
            QueryOutcome::Cached(p) | QueryOutcome::Executed(p) => p.query_number,
            QueryOutcome::Sampled(p) => p.query_number,
            QueryOutcome::Failed(p) => p.query_number,
        }
    }
}

/// Full (unsampled) result payload
#[derive(Debug, Clone, Serialize)]
pub struct ResultPayload {
    pub success: bool,
    pub sampled: bool,
    pub data: Vec<serde_json::Value>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub execution_time_ms: u64,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<QueryDiff>,
    pub query_number: usize,
}

/// Sampled result payload: bounded rows plus full-dataset statistics.
/// The flattened sample contributes `sampled`, `sampling_method`,
/// `total_rows`, `sample_size`, `statistics`, and `sample_rows`.
#[derive(Debug, Clone, Serialize)]
pub struct SampledPayload {
    pub success: bool,
    #[serde(flatten)]
    pub sample: StratifiedSample,
    pub execution_time_ms: u64,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<QueryDiff>,
    pub query_number: usize,
    pub note: String,
}

/// Failure payload with a human-actionable suggestion for the agent
#[derive(Debug, Clone, Serialize)]
pub struct FailedPayload {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub query_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<QueryDiff>,
}

impl QueryOutcome {
    pub fn executed(
        data: Vec<serde_json::Value>,
        columns: Vec<String>,
        execution_time_ms: u64,
        from_cache: bool,
        diff: Option<QueryDiff>,
        query_number: usize,
    ) -> Self {
        let row_count = data.len();
        let payload = ResultPayload {
            success: true,
            sampled: false,
            data,
            row_count,
            columns,
            execution_time_ms,
            from_cache,
            diff,
            query_number,
        };
        if from_cache {
            QueryOutcome::Cached(payload)
        } else {
            QueryOutcome::Executed(payload)
        }
    }

    pub fn sampled(
        sample: StratifiedSample,
        execution_time_ms: u64,
        from_cache: bool,
        diff: Option<QueryDiff>,
        query_number: usize,
    ) -> Self {
        let note = format!(
            "Result set has {} rows; returning a representative sample of {} with statistics computed over the full set.",
            sample.total_rows, sample.sample_size
        );
        QueryOutcome::Sampled(SampledPayload {
            success: true,
            sample,
            execution_time_ms,
            from_cache,
            diff,
            query_number,
            note,
        })
    }

    pub fn failed(
        error: impl Into<String>,
        suggestion: Option<String>,
        query_number: usize,
        diff: Option<QueryDiff>,
    ) -> Self {
        QueryOutcome::Failed(FailedPayload {
            success: false,
            error: error.into(),
            suggestion,
            query_number,
            diff,
        })
    }
}
