use serde::Serialize;

/// Column type inferred by majority vote over non-null values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Text,
    Timestamp,
    Boolean,
    Unknown,
}

/// How the row sample was drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMethod {
    Full,
    Random,
    Stratified,
}

/// Per-column statistics computed over the full result set
#[derive(Debug, Clone, Serialize)]
pub struct ColumnStatistics {
    pub name: String,
    pub column_type: ColumnType,
    pub distinct_count: usize,
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_25: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_75: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile_95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_values: Option<Vec<serde_json::Value>>,
}

impl ColumnStatistics {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            distinct_count: 0,
            null_count: 0,
            min: None,
            max: None,
            mean: None,
            median: None,
            percentile_25: None,
            percentile_50: None,
            percentile_75: None,
            percentile_95: None,
            mode: None,
            sample_values: None,
        }
    }
}

/// Bounded-size representative sample plus full-dataset statistics
#[derive(Debug, Clone, Serialize)]
pub struct StratifiedSample {
    pub total_rows: usize,
    pub columns: Vec<String>,
    pub statistics: Vec<ColumnStatistics>,
    #[serde(rename = "sample_data")]
    pub sample_rows: Vec<serde_json::Value>,
    pub sample_size: usize,
    pub sampled: bool,
    pub sampling_method: SamplingMethod,
}

impl StratifiedSample {
    /// Well-formed sample for an empty result set
    pub fn empty() -> Self {
        Self {
            total_rows: 0,
            columns: Vec::new(),
            statistics: Vec::new(),
            sample_rows: Vec::new(),
            sample_size: 0,
            sampled: false,
            sampling_method: SamplingMethod::Full,
        }
    }
}
