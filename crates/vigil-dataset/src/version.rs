//! Dataset version strings: `YYYYMMDDHHMMSS-NNN`.
//!
//! Versions must grow strictly, both as strings and in time order, even when
//! the clock stalls or goes backward between two builds.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_SUFFIX: u32 = 999;

fn parse_version(version: &str) -> Option<(NaiveDateTime, u32)> {
    let (timestamp, suffix) = version.split_once('-')?;
    if timestamp.len() != 14 || suffix.len() != 3 {
        return None;
    }
    let timestamp = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    let suffix = suffix.parse::<u32>().ok()?;
    Some((timestamp, suffix))
}

fn format_version(timestamp: NaiveDateTime, suffix: u32) -> String {
    format!("{}-{suffix:03}", timestamp.format(TIMESTAMP_FORMAT))
}

/// Version following `previous` at time `now`.
///
/// A later second resets the suffix to `001`. The same or an earlier second
/// keeps the previous timestamp and bumps the suffix; past `999` the
/// timestamp moves one second forward instead.
#[must_use]
pub fn generate_next_version(previous: Option<&str>, now: DateTime<Utc>) -> String {
    let now = now.naive_utc();
    let now_second = now.with_nanosecond(0).unwrap_or(now);

    let Some(previous) = previous else {
        return format_version(now_second, 1);
    };
    let Some((prev_timestamp, prev_suffix)) = parse_version(previous) else {
        tracing::warn!(previous, "unparsable previous dataset version, starting fresh");
        return format_version(now_second, 1);
    };

    if now_second > prev_timestamp {
        format_version(now_second, 1)
    } else if prev_suffix < MAX_SUFFIX {
        format_version(prev_timestamp, prev_suffix + 1)
    } else {
        format_version(prev_timestamp + Duration::seconds(1), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap()
    }

    #[test]
    fn first_version() {
        assert_eq!(generate_next_version(None, at(9, 26, 53)), "20260314092653-001");
    }

    #[test]
    fn later_second_resets_suffix() {
        assert_eq!(
            generate_next_version(Some("20260314092653-007"), at(9, 26, 54)),
            "20260314092654-001"
        );
    }

    #[test]
    fn same_second_bumps_suffix() {
        assert_eq!(
            generate_next_version(Some("20260314092653-001"), at(9, 26, 53)),
            "20260314092653-002"
        );
    }

    #[test]
    fn clock_going_backward_still_grows() {
        let next = generate_next_version(Some("20260314092653-041"), at(8, 0, 0));
        assert_eq!(next, "20260314092653-042");
    }

    #[test]
    fn suffix_overflow_moves_to_next_second() {
        let next = generate_next_version(Some("20260314092659-999"), at(9, 26, 59));
        assert_eq!(next, "20260314092700-001");
    }

    #[test]
    fn always_strictly_greater() {
        let nows = [at(0, 0, 0), at(9, 26, 52), at(9, 26, 53), at(9, 26, 54), at(23, 59, 59)];
        let previous = [
            "20260314092653-001",
            "20260314092653-998",
            "20260314092653-999",
            "20260314235959-999",
            "20991231235959-500",
        ];
        for prev in previous {
            for now in nows {
                let next = generate_next_version(Some(prev), now);
                assert!(next.as_str() > prev, "{next} should be greater than {prev}");
                assert!(parse_version(&next).unwrap() > parse_version(prev).unwrap());
            }
        }
    }

    #[test]
    fn garbage_previous_is_ignored() {
        assert_eq!(
            generate_next_version(Some("not-a-version"), at(1, 2, 3)),
            "20260314010203-001"
        );
    }
}
