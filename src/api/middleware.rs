use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Table mismatch: {0}")]
    TableMismatch(String),

    #[error("Duplicate query: {0}")]
    DuplicateQuery(String),

    #[error("Query timeout: {0}")]
    Timeout(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Actionable hint for the agent revising its query
    pub fn suggestion(&self) -> Option<String> {
        let s = match self {
            AppError::Validation(ValidationError::EmptyQuery) => {
                "Provide a non-empty SELECT statement."
            }
            AppError::Validation(ValidationError::ForbiddenOperation(_)) => {
                "Only read-only SELECT queries are allowed. Remove the write/DDL keyword."
            }
            AppError::Validation(ValidationError::MultipleStatements) => {
                "Submit exactly one statement per call."
            }
            AppError::Validation(ValidationError::InvalidStart) => {
                "Rewrite the query to start with SELECT or WITH."
            }
            AppError::Validation(ValidationError::SystemTableAccess) => {
                "Query the dataset table instead of system catalogs."
            }
            AppError::Validation(ValidationError::SuspiciousPattern(_)) => {
                "Remove the flagged identifier and try again."
            }
            AppError::TableMismatch(_) => {
                "Use the canonical table name for this dataset in the FROM clause."
            }
            AppError::DuplicateQuery(_) => {
                "This exact query was just executed. Reuse the previous result, or change the query if you need something different."
            }
            AppError::Timeout(_) => {
                "Simplify the query or add more selective filters so it completes within the timeout."
            }
            AppError::Execution(_) => {
                "Check the SQL syntax and that the referenced columns exist in the dataset."
            }
            AppError::Connection(_) => "Check the database connection and retry.",
            AppError::Internal(_) => return None,
        };
        Some(s.to_string())
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_SQL", self.to_string()),
            ),
            AppError::TableMismatch(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("TABLE_MISMATCH", self.to_string()),
            ),
            AppError::DuplicateQuery(_) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("DUPLICATE_QUERY", self.to_string()),
            ),
            AppError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorDetail::new("QUERY_TIMEOUT", self.to_string()),
            ),
            AppError::Execution(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("EXECUTION_ERROR", self.to_string()),
            ),
            AppError::Connection(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("CONNECTION_ERROR", self.to_string()),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", self.to_string()),
            ),
        };

        let error_detail = match self.suggestion() {
            Some(suggestion) => ErrorDetail {
                details: Some(suggestion),
                ..error_detail
            },
            None => error_detail,
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let error = AppError::Validation(ValidationError::InvalidStart);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let error = AppError::Timeout("30 seconds".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_suggestions_are_actionable() {
        let error = AppError::DuplicateQuery("SELECT 1".to_string());
        assert!(error.suggestion().unwrap().contains("previous result"));

        let error = AppError::Internal("boom".to_string());
        assert!(error.suggestion().is_none());
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }
}
