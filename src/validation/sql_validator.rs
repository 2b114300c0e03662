use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

/// Validation failures, in the order the rules are applied
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Forbidden operation: {0} is not allowed in read-only queries")]
    ForbiddenOperation(String),

    #[error("Multiple SQL statements are not allowed")]
    MultipleStatements,

    #[error("Query must start with SELECT or WITH")]
    InvalidStart,

    #[error("Access to system tables is not allowed")]
    SystemTableAccess,

    #[error("Suspicious pattern detected: {0}")]
    SuspiciousPattern(String),
}

static FORBIDDEN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(DROP|DELETE|UPDATE|INSERT|TRUNCATE|ALTER|CREATE|GRANT|REVOKE|EXECUTE|CALL)\b",
    )
    .expect("forbidden keyword regex")
});

static LIMIT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").expect("limit keyword regex"));

/// Lexical SQL guard for agent-issued queries.
///
/// This is deliberately not a parser: it scans the raw text so its behavior
/// is predictable and cheap. Keywords inside string literals trip it, which
/// is accepted as a false positive of the guard.
pub struct SqlValidator;

impl SqlValidator {
    /// Validate a raw query against the read-only rules.
    ///
    /// Rules are applied in order and the first failure wins.
    pub fn validate(query: &str) -> Result<(), ValidationError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        if let Some(m) = FORBIDDEN_KEYWORDS.find(trimmed) {
            return Err(ValidationError::ForbiddenOperation(
                m.as_str().to_uppercase(),
            ));
        }

        let statements: Vec<&str> = trimmed
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if statements.len() > 1 {
            return Err(ValidationError::MultipleStatements);
        }

        let upper = trimmed.to_uppercase();
        if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
            return Err(ValidationError::InvalidStart);
        }

        let lower = trimmed.to_lowercase();
        if lower.contains("pg_") || lower.contains("information_schema") {
            return Err(ValidationError::SystemTableAccess);
        }

        if lower.contains("xp_") {
            return Err(ValidationError::SuspiciousPattern("xp_".to_string()));
        }
        if lower.contains("sp_") {
            return Err(ValidationError::SuspiciousPattern("sp_".to_string()));
        }

        Ok(())
    }

    /// Append a bounding LIMIT clause when the query lacks one.
    pub fn ensure_limit(sql: &str, default_limit: u64) -> String {
        if Self::has_limit(sql) {
            sql.to_string()
        } else {
            let trimmed_sql = sql.trim_end_matches(';').trim();
            format!("{} LIMIT {}", trimmed_sql, default_limit)
        }
    }

    /// Check if SQL has a LIMIT clause using AST parsing, avoiding false
    /// positives from table or column names containing "limit". Falls back
    /// to a keyword scan when the query does not parse.
    pub fn has_limit(sql: &str) -> bool {
        let dialect = PostgreSqlDialect {};
        let mut parser = match Parser::new(&dialect).try_with_sql(sql) {
            Ok(p) => p,
            Err(_) => return LIMIT_KEYWORD.is_match(sql),
        };

        let ast = match parser.parse_statements() {
            Ok(statements) => statements,
            Err(_) => return LIMIT_KEYWORD.is_match(sql),
        };

        match ast.first() {
            Some(stmt) => Self::check_limit_in_statement(stmt),
            None => false,
        }
    }

    /// Check if a statement has a LIMIT clause using AST analysis
    fn check_limit_in_statement(stmt: &Statement) -> bool {
        match stmt {
            Statement::Query(query) => query.limit_clause.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query() {
        assert_eq!(SqlValidator::validate(""), Err(ValidationError::EmptyQuery));
        assert_eq!(
            SqlValidator::validate("   \n\t "),
            Err(ValidationError::EmptyQuery)
        );
    }

    #[test]
    fn test_forbidden_keywords_any_case_and_position() {
        let cases = [
            "DROP TABLE users",
            "select * from t; drop table t",
            "SELECT * FROM t WHERE id IN (DELETE FROM t)",
            "sElEcT * FROM t uNiOn InSeRt INTO t VALUES (1)",
            "WITH x AS (SELECT 1) UPDATE t SET a = 1",
            "SELECT * FROM t; TRUNCATE t",
            "alter table t add column c int",
            "CREATE TABLE t (id int)",
            "GRANT ALL ON t TO public",
            "REVOKE ALL ON t FROM public",
            "EXECUTE some_plan",
            "CALL some_proc()",
        ];
        for sql in cases {
            assert!(
                matches!(
                    SqlValidator::validate(sql),
                    Err(ValidationError::ForbiddenOperation(_))
                ),
                "expected ForbiddenOperation for: {}",
                sql
            );
        }
    }

    #[test]
    fn test_forbidden_keyword_is_whole_word() {
        // Substrings of identifiers must not trip the guard
        assert!(SqlValidator::validate("SELECT updated_at FROM t").is_ok());
        assert!(SqlValidator::validate("SELECT dropped_count FROM t").is_ok());
        assert!(SqlValidator::validate("SELECT recall FROM t").is_ok());
    }

    #[test]
    fn test_multiple_statements() {
        assert_eq!(
            SqlValidator::validate("SELECT 1; SELECT 2"),
            Err(ValidationError::MultipleStatements)
        );
        // A trailing semicolon is still a single statement
        assert!(SqlValidator::validate("SELECT 1;").is_ok());
    }

    #[test]
    fn test_start_keyword() {
        assert!(SqlValidator::validate("   select * from t").is_ok());
        assert!(SqlValidator::validate("WITH x AS (SELECT 1) SELECT * FROM x").is_ok());
        assert_eq!(
            SqlValidator::validate("EXPLAIN SELECT 1"),
            Err(ValidationError::InvalidStart)
        );
    }

    #[test]
    fn test_system_table_access() {
        assert_eq!(
            SqlValidator::validate("SELECT * FROM pg_catalog.pg_tables"),
            Err(ValidationError::SystemTableAccess)
        );
        assert_eq!(
            SqlValidator::validate("SELECT * FROM Information_Schema.tables"),
            Err(ValidationError::SystemTableAccess)
        );
    }

    #[test]
    fn test_suspicious_patterns() {
        assert!(matches!(
            SqlValidator::validate("SELECT * FROM t WHERE a = xp_cmdshell"),
            Err(ValidationError::SuspiciousPattern(_))
        ));
        assert!(matches!(
            SqlValidator::validate("SELECT sp_helptext FROM t"),
            Err(ValidationError::SuspiciousPattern(_))
        ));
    }

    #[test]
    fn test_ensure_limit() {
        let sql = "SELECT * FROM users";
        let result = SqlValidator::ensure_limit(sql, 10000);
        assert!(result.contains("LIMIT 10000"));

        let sql = "SELECT * FROM users LIMIT 100";
        let result = SqlValidator::ensure_limit(sql, 10000);
        assert_eq!(result, sql);

        // Trailing semicolon is stripped before appending
        let result = SqlValidator::ensure_limit("SELECT * FROM users;", 500);
        assert_eq!(result, "SELECT * FROM users LIMIT 500");
    }

    #[test]
    fn test_limit_detection_with_ast() {
        // Table name contains "limit" - should NOT be detected as having LIMIT
        assert!(!SqlValidator::has_limit("SELECT * FROM table_limit"));
        // Column name contains "limit" - should NOT be detected
        assert!(!SqlValidator::has_limit("SELECT limit_value FROM users"));
        // Actual LIMIT clause - should be detected
        assert!(SqlValidator::has_limit("SELECT * FROM users LIMIT 50"));
        // LIMIT with OFFSET - should be detected
        assert!(SqlValidator::has_limit(
            "SELECT * FROM users LIMIT 100 OFFSET 10"
        ));
    }
}
