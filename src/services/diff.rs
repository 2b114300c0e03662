// Clause-level query diff
//
// Compares successive queries on the same table and surfaces what changed,
// flagging apparent accidental filter losses as critical so the calling
// agent can notice before it reasons over the new result. Clause extraction
// is lexical: keywords are located in the raw text, not parsed, with the
// same known edge cases as the validator (keywords inside string literals
// or subqueries out of position).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::QueryDiff;

const CLAUSES: [&str; 6] = ["SELECT", "FROM", "WHERE", "GROUP BY", "ORDER BY", "LIMIT"];

static CLAUSE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("SELECT", Regex::new(r"(?i)\bSELECT\b").unwrap()),
        ("FROM", Regex::new(r"(?i)\bFROM\b").unwrap()),
        ("WHERE", Regex::new(r"(?i)\bWHERE\b").unwrap()),
        ("GROUP BY", Regex::new(r"(?i)\bGROUP\s+BY\b").unwrap()),
        ("ORDER BY", Regex::new(r"(?i)\bORDER\s+BY\b").unwrap()),
        ("LIMIT", Regex::new(r"(?i)\bLIMIT\b").unwrap()),
    ]
});

static AND_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+(?:AND|OR)\s+").unwrap());

static BRANCH_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)branch_name\s*=\s*'([^']*)'").unwrap());

static DATE_FILTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sale_date|date|created_at)\b\s*(?:=|!=|<>|>=|<=|>|<|BETWEEN|LIKE)")
        .unwrap()
});

/// Tracks what changed between successive queries on a table
pub struct QueryDiffTracker;

impl QueryDiffTracker {
    /// Compare the current query against its predecessor.
    ///
    /// Returns `None` for the first query of a session. Never fails the
    /// surrounding call: an internal panic degrades to "no diff available".
    pub fn compare(previous: Option<&str>, current: &str) -> Option<QueryDiff> {
        let previous = previous?;
        match catch_unwind(AssertUnwindSafe(|| Self::diff_queries(previous, current))) {
            Ok(diff) => Some(diff),
            Err(_) => {
                tracing::warn!("Query diff computation failed; continuing without a diff");
                None
            }
        }
    }

    fn diff_queries(previous: &str, current: &str) -> QueryDiff {
        if previous.trim() == current.trim() {
            return QueryDiff {
                previous: previous.to_string(),
                current: current.to_string(),
                unified_diff: String::new(),
                critical_changes: Vec::new(),
                summary: "No changes - query is identical".to_string(),
            };
        }

        let prev_clauses = Self::extract_clauses(previous);
        let cur_clauses = Self::extract_clauses(current);

        let mut lines: Vec<String> = Vec::new();
        let mut critical_changes: Vec<String> = Vec::new();

        for clause in CLAUSES {
            match (prev_clauses.get(clause), cur_clauses.get(clause)) {
                (Some(prev_text), None) => {
                    lines.push(format!("-{} {}", clause, prev_text));
                    if clause == "WHERE" {
                        critical_changes.push("Entire WHERE clause was removed!".to_string());
                    }
                }
                (None, Some(cur_text)) => {
                    lines.push(format!("+{} {}", clause, cur_text));
                }
                (Some(prev_text), Some(cur_text)) if prev_text != cur_text => {
                    let prev_parts = Self::split_parts(clause, prev_text);
                    let cur_parts = Self::split_parts(clause, cur_text);
                    for part in &prev_parts {
                        if !cur_parts.contains(part) {
                            lines.push(format!("-  {}", part));
                        }
                    }
                    for part in &cur_parts {
                        if !prev_parts.contains(part) {
                            lines.push(format!("+  {}", part));
                        }
                    }
                }
                _ => {}
            }
        }

        critical_changes.extend(Self::lost_filters(previous, current));

        let mut summary = format!("{} line(s) changed", lines.len());
        if !critical_changes.is_empty() {
            summary.push_str(&format!(" - {} CRITICAL", critical_changes.len()));
        }

        QueryDiff {
            previous: previous.to_string(),
            current: current.to_string(),
            unified_diff: lines.join("\n"),
            critical_changes,
            summary,
        }
    }

    /// Locate each canonical clause and slice its text up to the next
    /// recognized clause keyword (or end of string). First occurrence wins
    /// when a keyword repeats.
    fn extract_clauses(query: &str) -> HashMap<&'static str, String> {
        let normalized = Self::normalize(query);

        let mut marks: Vec<(usize, usize, &'static str)> = CLAUSE_PATTERNS
            .iter()
            .filter_map(|(name, pattern)| {
                pattern
                    .find(&normalized)
                    .map(|m| (m.start(), m.end(), *name))
            })
            .collect();
        marks.sort_by_key(|(start, _, _)| *start);

        let mut clauses = HashMap::new();
        for (i, (_, end, name)) in marks.iter().enumerate() {
            let until = marks
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(normalized.len());
            let text = normalized[*end..until].trim().to_string();
            clauses.insert(*name, text);
        }
        clauses
    }

    /// Split a clause into atomic parts: WHERE on AND/OR, list-shaped
    /// clauses on commas, everything else compared whole.
    fn split_parts(clause: &str, text: &str) -> Vec<String> {
        let parts: Vec<String> = match clause {
            "WHERE" => AND_OR.split(text).map(|p| p.trim().to_string()).collect(),
            "SELECT" | "GROUP BY" | "ORDER BY" => {
                text.split(',').map(|p| p.trim().to_string()).collect()
            }
            _ => vec![text.trim().to_string()],
        };
        parts.into_iter().filter(|p| !p.is_empty()).collect()
    }

    /// Literal heuristics for accidentally dropped filters, independent of
    /// the structural clause diff.
    fn lost_filters(previous: &str, current: &str) -> Vec<String> {
        let prev = Self::normalize(previous);
        let cur = Self::normalize(current);
        let mut lost = Vec::new();

        let cur_branches: Vec<String> = BRANCH_FILTER
            .captures_iter(&cur)
            .map(|c| c[1].to_lowercase())
            .collect();
        for captures in BRANCH_FILTER.captures_iter(&prev) {
            let value = &captures[1];
            if !cur_branches.contains(&value.to_lowercase()) {
                lost.push(format!("Lost filter: branch_name = '{}'", value));
            }
        }

        let cur_date_columns: Vec<String> = DATE_FILTER
            .captures_iter(&cur)
            .map(|c| c[1].to_uppercase())
            .collect();
        for captures in DATE_FILTER.captures_iter(&prev) {
            let column = captures[1].to_uppercase();
            if !cur_date_columns.contains(&column) {
                lost.push(format!("Lost date filter on {}", column));
            }
        }

        lost
    }

    fn normalize(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Render a diff for a downstream language-model caller
    pub fn format_diff(diff: &QueryDiff) -> String {
        let mut out = String::from("--- Previous\n+++ Current\n");
        if !diff.unified_diff.is_empty() {
            out.push_str(&diff.unified_diff);
            out.push('\n');
        }
        if !diff.critical_changes.is_empty() {
            out.push_str("!!! CRITICAL CHANGES !!!\n");
            for change in &diff.critical_changes {
                out.push_str(&format!("  - {}\n", change));
            }
        }
        out.push_str(&diff.summary);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_previous_query() {
        assert!(QueryDiffTracker::compare(None, "SELECT 1").is_none());
    }

    #[test]
    fn test_identical_queries() {
        let q = "SELECT * FROM csv_1_a WHERE x = 1";
        let diff = QueryDiffTracker::compare(Some(q), q).unwrap();
        assert_eq!(diff.summary, "No changes - query is identical");
        assert!(diff.unified_diff.is_empty());
        assert!(diff.critical_changes.is_empty());

        // Trimmed comparison
        let diff = QueryDiffTracker::compare(Some("  SELECT 1 "), "SELECT 1").unwrap();
        assert_eq!(diff.summary, "No changes - query is identical");
    }

    #[test]
    fn test_where_clause_removal_is_critical() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE branch_name = 'east' "),
            "SELECT * FROM t",
        )
        .unwrap();

        assert!(diff
            .critical_changes
            .contains(&"Entire WHERE clause was removed!".to_string()));
        assert!(diff
            .critical_changes
            .iter()
            .any(|c| c.contains("branch_name") && c.contains("'east'")));
        assert!(diff.unified_diff.contains("-WHERE branch_name = 'east'"));
        assert!(diff.summary.contains("CRITICAL"));
    }

    #[test]
    fn test_added_clause() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t"),
            "SELECT * FROM t ORDER BY id",
        )
        .unwrap();
        assert!(diff.unified_diff.contains("+ORDER BY id"));
        assert!(diff.critical_changes.is_empty());
    }

    #[test]
    fn test_select_parts_set_difference() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT a, b, c FROM t"),
            "SELECT a, c, d FROM t",
        )
        .unwrap();
        assert!(diff.unified_diff.contains("-  b"));
        assert!(diff.unified_diff.contains("+  d"));
        assert!(!diff.unified_diff.contains("-  a"));
        assert_eq!(diff.summary, "2 line(s) changed");
    }

    #[test]
    fn test_where_parts_split_on_and_or() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE x = 1 AND y = 2 OR z = 3"),
            "SELECT * FROM t WHERE x = 1 AND z = 3",
        )
        .unwrap();
        assert!(diff.unified_diff.contains("-  y = 2"));
        assert!(!diff.unified_diff.contains("-  x = 1"));
    }

    #[test]
    fn test_changed_branch_filter_reports_lost_value() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE branch_name = 'east'"),
            "SELECT * FROM t WHERE branch_name = 'west'",
        )
        .unwrap();
        assert!(diff
            .critical_changes
            .contains(&"Lost filter: branch_name = 'east'".to_string()));
    }

    #[test]
    fn test_kept_branch_filter_is_not_flagged() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE branch_name = 'east'"),
            "SELECT *, 1 FROM t WHERE branch_name = 'east'",
        )
        .unwrap();
        assert!(diff.critical_changes.is_empty());
    }

    #[test]
    fn test_lost_date_filter() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE sale_date >= '2024-01-01' AND x = 1"),
            "SELECT * FROM t WHERE x = 1",
        )
        .unwrap();
        assert!(diff
            .critical_changes
            .contains(&"Lost date filter on SALE_DATE".to_string()));
        assert!(diff.unified_diff.contains("-  sale_date >= '2024-01-01'"));
    }

    #[test]
    fn test_summary_counts_lines_and_criticals() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT a, b FROM t WHERE branch_name = 'east'"),
            "SELECT a FROM t",
        )
        .unwrap();
        // one SELECT part removed, WHERE clause removed
        assert_eq!(
            diff.summary,
            format!("2 line(s) changed - {} CRITICAL", diff.critical_changes.len())
        );
        assert_eq!(diff.critical_changes.len(), 2);
    }

    #[test]
    fn test_limit_change_compared_whole() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t LIMIT 10"),
            "SELECT * FROM t LIMIT 100",
        )
        .unwrap();
        assert!(diff.unified_diff.contains("-  10"));
        assert!(diff.unified_diff.contains("+  100"));
    }

    #[test]
    fn test_format_diff_rendering() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT * FROM t WHERE branch_name = 'east'"),
            "SELECT * FROM t",
        )
        .unwrap();
        let rendered = QueryDiffTracker::format_diff(&diff);
        assert!(rendered.starts_with("--- Previous\n+++ Current\n"));
        assert!(rendered.contains("!!! CRITICAL CHANGES !!!"));
        assert!(rendered.contains("  - Entire WHERE clause was removed!"));
        assert!(rendered.ends_with(&diff.summary));
    }

    #[test]
    fn test_whitespace_only_differences_produce_no_part_lines() {
        let diff = QueryDiffTracker::compare(
            Some("SELECT a,  b FROM t"),
            "SELECT a, b FROM t",
        )
        .unwrap();
        assert!(diff.unified_diff.is_empty());
    }
}
