use chrono::Duration;
use regex::Regex;

/// Longest duration accepted, one year.
pub const MAX_DURATION_SECS: i64 = 365 * 86_400;

/// Parses strings such as `1d2h30m` or `90`. Units are `s`, `m`, `h` and
/// `d`; whitespace and case are ignored and bare trailing digits count as
/// seconds. Returns `None` for anything that is not a positive duration of
/// at most [`MAX_DURATION_SECS`].
pub fn parse_duration(input: &str) -> Option<Duration> {
    let compact = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    let shape = Regex::new(r"^(?:\d+[smhd])*\d*$").ok()?;
    if compact.is_empty() || !shape.is_match(&compact) {
        return None;
    }

    let token = Regex::new(r"(\d+)([smhd]?)").ok()?;
    let mut total: i64 = 0;
    for cap in token.captures_iter(&compact) {
        let value: i64 = cap[1].parse().ok()?;
        let unit = match &cap[2] {
            "d" => 86_400,
            "h" => 3600,
            "m" => 60,
            _ => 1,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }

    if total <= 0 || total > MAX_DURATION_SECS {
        return None;
    }
    Duration::try_seconds(total)
}

/// Compact rendering used in embeds, e.g. `1d 2h 30m`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3600, rest % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);

    let mut parts = vec![];
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1d2h30m"), Some(Duration::seconds(95_400)));
        assert_eq!(parse_duration("10m"), Some(Duration::seconds(600)));
        assert_eq!(parse_duration("10m30s"), Some(Duration::seconds(630)));
        assert_eq!(parse_duration("30m1h"), Some(Duration::seconds(5400)));
        assert_eq!(parse_duration(" 1H 5M "), Some(Duration::seconds(3900)));
        assert_eq!(parse_duration("2m15"), Some(Duration::seconds(135)));
        assert_eq!(parse_duration("45"), Some(Duration::seconds(45)));
    }

    #[test]
    fn rejects_invalid_input() {
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("5w"), None);
        assert_eq!(parse_duration("1h-5m"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }

    #[test]
    fn caps_at_one_year() {
        assert_eq!(parse_duration("365d"), Some(Duration::seconds(MAX_DURATION_SECS)));
        assert_eq!(parse_duration("365d1s"), None);
        assert_eq!(parse_duration("10000000000000s"), None);
        assert_eq!(parse_duration("9223372036854775807s"), None);
    }

    #[test]
    fn formats_compactly() {
        assert_eq!(format_duration(Duration::seconds(95_400)), "1d 2h 30m");
        assert_eq!(format_duration(Duration::seconds(61)), "1m 1s");
        assert_eq!(format_duration(Duration::zero()), "0s");
        assert_eq!(format_duration(Duration::seconds(-5)), "0s");
    }
}
