/// Label shown when a feed gives no usable duration.
pub const UNKNOWN_DURATION: &str = "Audio";

/// Formats a raw feed duration for display.
///
/// Accepted shapes:
///
/// - plain seconds (`"600"`, also `"1234.5"`, where only the leading integer counts) → `"10 min"`
/// - `HH:MM:SS` → `"1h 5m"`, or `"5 min"` when the hour part is zero
/// - `MM:SS` → `"5 min"`
/// - empty or missing → `"Audio"`
///
/// Anything else, including colon forms whose parts are not integers, is
/// returned verbatim.
///
/// # Examples
///
/// ```
/// use podfeed::util::format_duration;
///
/// assert_eq!(format_duration(Some("90")), "1 min");
/// assert_eq!(format_duration(Some("01:05:30")), "1h 5m");
/// assert_eq!(format_duration(Some("05:30")), "5 min");
/// assert_eq!(format_duration(None), "Audio");
/// ```
pub fn format_duration(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return UNKNOWN_DURATION.to_string(),
    };

    if !raw.contains(':') {
        return match leading_integer(raw) {
            Some(seconds) => format!("{} min", seconds / 60),
            None => raw.to_string(),
        };
    }

    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [h, m, _] => match (leading_integer(h), leading_integer(m)) {
            (Some(hours), Some(minutes)) if hours > 0 => format!("{hours}h {minutes}m"),
            (Some(_), Some(minutes)) => format!("{minutes} min"),
            _ => raw.to_string(),
        },
        [m, _] => match leading_integer(m) {
            Some(minutes) => format!("{minutes} min"),
            None => raw.to_string(),
        },
        _ => raw.to_string(),
    }
}

/// Formats a duration that arrived as a JSON value (string or number).
///
/// `null`, `0`, `""` and non-scalar values count as missing.
pub fn format_json_duration(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => format_duration(Some(s)),
        Some(serde_json::Value::Number(n)) if n.as_f64() != Some(0.0) => {
            format_duration(Some(&n.to_string()))
        }
        _ => format_duration(None),
    }
}

/// Parses the run of ASCII digits at the start of `s` (after leading whitespace).
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seconds() {
        assert_eq!(format_duration(Some("90")), "1 min");
        assert_eq!(format_duration(Some("600")), "10 min");
        assert_eq!(format_duration(Some("59")), "0 min");
        assert_eq!(format_duration(Some("1234.5")), "20 min");
    }

    #[test]
    fn test_hours_minutes_seconds() {
        assert_eq!(format_duration(Some("01:05:30")), "1h 5m");
        assert_eq!(format_duration(Some("00:18:02")), "18 min");
        assert_eq!(format_duration(Some("2:00:00")), "2h 0m");
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!(format_duration(Some("05:30")), "5 min");
        assert_eq!(format_duration(Some("75:00")), "75 min");
    }

    #[test]
    fn test_missing_or_empty() {
        assert_eq!(format_duration(None), "Audio");
        assert_eq!(format_duration(Some("")), "Audio");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(format_duration(Some("about an hour")), "about an hour");
        assert_eq!(format_duration(Some("1:2:3:4")), "1:2:3:4");
        assert_eq!(format_duration(Some("xx:30")), "xx:30");
    }

    #[test]
    fn test_json_values() {
        assert_eq!(format_json_duration(Some(&json!(600))), "10 min");
        assert_eq!(format_json_duration(Some(&json!(1234.5))), "20 min");
        assert_eq!(format_json_duration(Some(&json!("01:05:30"))), "1h 5m");
        assert_eq!(format_json_duration(Some(&json!(0))), "Audio");
        assert_eq!(format_json_duration(Some(&json!(null))), "Audio");
        assert_eq!(format_json_duration(Some(&json!([1, 2]))), "Audio");
        assert_eq!(format_json_duration(None), "Audio");
    }
}
