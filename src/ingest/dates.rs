use chrono::{DateTime, Utc};

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// [`PUB_DATE_FORMAT`] after the `"Mon, "` prefix
const DATE_BODY_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Parse an item's `<pubDate>`.
///
/// The weekday must be a valid abbreviation but is not checked against the
/// date, since feeds frequently get it wrong. After it, the numeric-zone
/// RFC 1123 body is tried first; anything RFC 2822 accepts (zone names such
/// as `GMT`, no weekday at all) is taken as a fallback.
pub fn parse_pub_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let value = value.trim();
    let body = match value.split_once(',') {
        Some((day, rest)) if WEEKDAYS.contains(&day.trim()) => rest.trim_start(),
        _ => value,
    };

    DateTime::parse_from_str(body, DATE_BODY_FORMAT)
        .or_else(|err| DateTime::parse_from_rfc2822(body).map_err(|_| err))
        .map(|dt| dt.with_timezone(&Utc))
}
