use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

static TIMESTAMP_RANDOM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+_[a-z0-9]+$").expect("timestamp-random regex"));

static PREFIXED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^csv_\d+_[a-z0-9]+$").expect("prefixed name regex"));

/// Map a raw dataset identifier to its canonical table name.
///
/// Recognized shapes:
/// - UUID (`8-4-4-4-12` hex groups): dashes rewritten to underscores
/// - timestamp-random (`1700000000_ab12cd`)
/// - already-prefixed full name (`csv_1700000000_ab12cd`), returned as-is
///
/// Anything else is accepted with a `csv_` prefix added when missing, and
/// logged as a non-standard identifier. Idempotent on its own output.
pub fn sanitize_table_identity(raw_id: &str) -> String {
    let raw = raw_id.trim();

    if raw.len() == 36 && Uuid::parse_str(raw).is_ok() {
        return format!("csv_{}", raw.to_lowercase().replace('-', "_"));
    }

    if TIMESTAMP_RANDOM.is_match(raw) {
        return format!("csv_{}", raw);
    }

    if PREFIXED_NAME.is_match(raw) {
        return raw.to_string();
    }

    if let Some(stripped) = raw.strip_prefix("csv_") {
        tracing::warn!("Non-standard dataset identifier accepted: csv_{}", stripped);
        return raw.to_string();
    }

    tracing::warn!("Non-standard dataset identifier accepted: {}", raw);
    format!("csv_{}", raw)
}
