// Stratified sampler
//
// Reduces large result sets to a bounded row sample plus per-column
// statistics. Statistics are always computed over the full row set, so
// ranges and percentiles stay exact even when only a sample of rows is
// returned. The sampler never fails: degenerate input yields an empty,
// well-formed sample.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::models::{ColumnStatistics, ColumnType, SamplingMethod, StratifiedSample};

/// Share of non-null values that must agree before a type is assigned
const TYPE_VOTE_THRESHOLD: f64 = 0.8;

/// Distinct example values collected for text columns
const TEXT_SAMPLE_VALUES: usize = 10;

pub struct StratifiedSampler;

impl StratifiedSampler {
    /// Summarize a result set into a bounded sample with full-set statistics.
    pub fn sample(rows: &[Value], columns: &[String], max_sample_rows: usize) -> StratifiedSample {
        if rows.is_empty() {
            return StratifiedSample::empty();
        }

        let columns: Vec<String> = if columns.is_empty() {
            Self::infer_columns(rows)
        } else {
            columns.to_vec()
        };

        let statistics = columns
            .iter()
            .map(|column| Self::column_statistics(column, rows))
            .collect();

        let total_rows = rows.len();
        if total_rows <= max_sample_rows {
            return StratifiedSample {
                total_rows,
                columns,
                statistics,
                sample_rows: rows.to_vec(),
                sample_size: total_rows,
                sampled: false,
                sampling_method: SamplingMethod::Full,
            };
        }

        let sample_size = max_sample_rows.min(total_rows);
        let mut rng = rand::thread_rng();
        let sample_rows: Vec<Value> = rows
            .choose_multiple(&mut rng, sample_size)
            .cloned()
            .collect();

        StratifiedSample {
            total_rows,
            columns,
            statistics,
            sample_rows,
            sample_size,
            sampled: true,
            sampling_method: SamplingMethod::Random,
        }
    }

    /// Column order from the first row when the caller has none
    fn infer_columns(rows: &[Value]) -> Vec<String> {
        rows.first()
            .and_then(Value::as_object)
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn column_statistics(column: &str, rows: &[Value]) -> ColumnStatistics {
        let values: Vec<&Value> = rows
            .iter()
            .map(|row| row.get(column).unwrap_or(&Value::Null))
            .collect();

        let non_null: Vec<&Value> = values
            .iter()
            .copied()
            .filter(|v| !v.is_null())
            .collect();

        let column_type = Self::infer_type(&non_null);
        let mut stats = ColumnStatistics::new(column, column_type);

        stats.null_count = values.len() - non_null.len();
        stats.distinct_count = {
            let mut seen = std::collections::HashSet::new();
            non_null.iter().for_each(|v| {
                seen.insert(Self::value_key(v));
            });
            seen.len()
        };
        stats.mode = Self::mode(&non_null);

        match column_type {
            ColumnType::Numeric => {
                let mut numbers: Vec<f64> =
                    non_null.iter().filter_map(|v| Self::as_number(v)).collect();
                numbers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                if !numbers.is_empty() {
                    stats.min = numbers.first().copied();
                    stats.max = numbers.last().copied();
                    stats.mean = Some(numbers.iter().sum::<f64>() / numbers.len() as f64);
                    stats.percentile_25 = Some(Self::percentile(&numbers, 25.0));
                    stats.percentile_50 = Some(Self::percentile(&numbers, 50.0));
                    stats.percentile_75 = Some(Self::percentile(&numbers, 75.0));
                    stats.percentile_95 = Some(Self::percentile(&numbers, 95.0));
                    stats.median = stats.percentile_50;
                }
            }
            ColumnType::Text => {
                let mut samples: Vec<Value> = Vec::new();
                let mut seen = std::collections::HashSet::new();
                for value in &non_null {
                    if samples.len() >= TEXT_SAMPLE_VALUES {
                        break;
                    }
                    if seen.insert(Self::value_key(value)) {
                        samples.push((*value).clone());
                    }
                }
                stats.sample_values = Some(samples);
            }
            _ => {}
        }

        stats
    }

    /// Majority-vote type inference over non-null values
    fn infer_type(non_null: &[&Value]) -> ColumnType {
        if non_null.is_empty() {
            return ColumnType::Unknown;
        }

        let total = non_null.len() as f64;
        let numeric = non_null.iter().filter(|v| Self::as_number(v).is_some()).count() as f64;
        if numeric / total >= TYPE_VOTE_THRESHOLD {
            return ColumnType::Numeric;
        }

        let boolean = non_null.iter().filter(|v| Self::is_boolean(v)).count() as f64;
        if boolean / total >= TYPE_VOTE_THRESHOLD {
            return ColumnType::Boolean;
        }

        let timestamp = non_null.iter().filter(|v| Self::is_timestamp(v)).count() as f64;
        if timestamp / total >= TYPE_VOTE_THRESHOLD {
            return ColumnType::Timestamp;
        }

        ColumnType::Text
    }

    fn as_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn is_boolean(value: &Value) -> bool {
        match value {
            Value::Bool(_) => true,
            Value::String(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "false" | "t" | "f" | "yes" | "no"
            ),
            _ => false,
        }
    }

    fn is_timestamp(value: &Value) -> bool {
        let Value::String(s) = value else {
            return false;
        };
        let s = s.trim();
        DateTime::parse_from_rfc3339(s).is_ok()
            || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
            || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            || NaiveDate::parse_from_str(s, "%Y/%m/%d").is_ok()
    }

    /// Most frequent value, first-seen tie-break
    fn mode(non_null: &[&Value]) -> Option<Value> {
        if non_null.is_empty() {
            return None;
        }
        let mut counts: IndexMap<String, (Value, usize)> = IndexMap::new();
        for value in non_null {
            counts
                .entry(Self::value_key(value))
                .or_insert_with(|| ((*value).clone(), 0))
                .1 += 1;
        }
        // Insertion order plus a strict comparison keeps the first-seen
        // value on ties
        let mut best: Option<(Value, usize)> = None;
        for (_, (value, count)) in counts {
            let better = match &best {
                Some((_, best_count)) => count > *best_count,
                None => true,
            };
            if better {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value)
    }

    /// Linear interpolation on the sorted value array
    pub fn percentile(sorted: &[f64], p: f64) -> f64 {
        match sorted.len() {
            0 => 0.0,
            1 => sorted[0],
            n => {
                let idx = p / 100.0 * (n - 1) as f64;
                let lo = idx.floor() as usize;
                let hi = idx.ceil() as usize;
                if lo == hi {
                    sorted[lo]
                } else {
                    sorted[lo] + (sorted[hi] - sorted[lo]) * (idx - lo as f64)
                }
            }
        }
    }

    fn value_key(value: &Value) -> String {
        value.to_string()
    }
}
