use chrono::{DateTime, Duration, Local, SecondsFormat, TimeZone, Utc};

/// Day-month-year, two digits each. Keys of the daily ledger use it.
pub const DAY_KEY_FORMAT: &str = "%d-%m-%y";

/// This is the standard way of converting a commit instant to a ledger key in sessionclock.
/// The calendar day is taken in the host's local time zone.
pub fn day_key(instant: DateTime<Utc>) -> String {
    day_key_in(instant, &Local)
}

pub fn day_key_in<Tz: TimeZone>(instant: DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(zone).format(DAY_KEY_FORMAT).to_string()
}

/// Encodes an instant for the checkpoint store. Keeps sub-second precision and the offset.
pub fn encode_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn decode_instant(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|v| v.with_timezone(&Utc))
}

pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1_000_000.).round() as i64)
}

pub fn duration_to_seconds(duration: Duration) -> f64 {
    match duration.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.,
        None => duration.num_milliseconds() as f64 / 1_000.,
    }
}

/// Formats as `HH:MM:SS`. Hours are not wrapped at a day.
pub fn format_duration(v: Duration) -> String {
    let v = v.max(Duration::zero());
    format!(
        "{:02}:{:02}:{:02}",
        v.num_hours(),
        v.num_minutes() % 60,
        v.num_seconds() % 60
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

    use super::*;

    fn test_date() -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            NaiveTime::from_hms_opt(23, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_day_key_follows_zone() {
        let instant = Utc.from_utc_datetime(&test_date());
        assert_eq!(day_key_in(instant, &Utc), "09-03-24");

        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(day_key_in(instant, &east), "10-03-24");
    }

    #[test]
    fn test_instant_encoding_keeps_precision() {
        let instant = Utc.from_utc_datetime(&test_date()) + Duration::nanoseconds(123_456_789);
        let encoded = encode_instant(instant);
        assert_eq!(encoded, "2024-03-09T23:30:00.123456789Z");
        assert_eq!(decode_instant(&encoded).unwrap(), instant);
    }

    #[test]
    fn test_decode_instant_with_offset() {
        let decoded = decode_instant("2024-03-10T01:30:00.5+02:00").unwrap();
        assert_eq!(
            decoded,
            Utc.from_utc_datetime(&test_date()) + Duration::milliseconds(500)
        );
    }

    #[test]
    fn test_decode_instant_rejects_garbage() {
        assert!(decode_instant("09-03-24").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(5)), "00:00:05");
        assert_eq!(format_duration(Duration::seconds(3 * 3600 + 61)), "03:01:01");
        assert_eq!(format_duration(Duration::hours(30)), "30:00:00");
        assert_eq!(format_duration(Duration::seconds(-4)), "00:00:00");
    }

    #[test]
    fn test_seconds_conversion() {
        let duration = seconds_to_duration(1.25);
        assert_eq!(duration, Duration::milliseconds(1250));
        assert_eq!(duration_to_seconds(duration), 1.25);
    }
}
