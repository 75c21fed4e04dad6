use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses the date shapes the backend emits and accepts. Naive values are
/// taken as UTC. Returns `None` for empty or unrecognised input.
pub fn parse_flexible(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || matches!(raw.to_ascii_lowercase().as_str(), "null" | "none") {
        return None;
    }

    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc());
        }
        // datetime-local inputs omit seconds
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
            return Some(naive.and_utc());
        }
        return None;
    }

    if raw.contains(':') {
        return NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
