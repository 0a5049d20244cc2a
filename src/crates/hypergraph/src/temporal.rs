//! Temporal parsing and containment.
//!
//! Interval bounds are stored as strings because the canonicaliser may emit
//! a descriptor ("start of the wedding") instead of a timestamp. Descriptor
//! bounds parse to `None` and behave as open bounds for querying.

use chrono::{NaiveDate, NaiveDateTime};

use crate::fact::TemporalInterval;

/// Parse an ISO-8601 bound, returning `None` for descriptors or absent input.
pub fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Concrete bounds of an interval; a descriptor bound is treated as open.
pub fn interval_bounds(
    interval: &TemporalInterval,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let start = interval.start_time.as_deref().and_then(parse_iso);
    let end = interval.end_time.as_deref().and_then(parse_iso);
    (start, end)
}

/// Inclusive containment with open bounds. No bounds at all is always valid.
pub fn is_within_range(
    at: NaiveDateTime,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> bool {
    match (start, end) {
        (Some(s), Some(e)) => s <= at && at <= e,
        (Some(s), None) => at >= s,
        (None, Some(e)) => at <= e,
        (None, None) => true,
    }
}

/// Whether any of a fact's intervals contains the given instant.
pub fn valid_at(intervals: &[TemporalInterval], at: NaiveDateTime) -> bool {
    intervals.iter().any(|interval| {
        let (start, end) = interval_bounds(interval);
        is_within_range(at, start, end)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn parses_full_timestamps_and_bare_dates() {
        assert!(parse_iso("2020-01-01T00:00:00").is_some());
        assert_eq!(
            parse_iso("1903-01-01"),
            NaiveDate::from_ymd_opt(1903, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn descriptor_bounds_parse_to_none() {
        assert!(parse_iso("start of the wedding").is_none());
        assert!(parse_iso("unknown").is_none());
        assert!(parse_iso("").is_none());
    }

    #[test]
    fn closed_interval_containment_is_inclusive() {
        let interval = TemporalInterval::new(
            Some("2023-01-01T00:00:00".into()),
            Some("2023-12-31T23:59:59".into()),
        );
        assert!(valid_at(&[interval.clone()], at(2023, 6, 1)));
        assert!(!valid_at(&[interval.clone()], at(2022, 12, 31)));
        assert!(!valid_at(&[interval], at(2024, 1, 1)));
    }

    #[test]
    fn open_bounds_extend_validity() {
        let from_only = TemporalInterval::new(Some("2023-01-01T00:00:00".into()), None);
        assert!(valid_at(&[from_only], at(2024, 1, 1)));

        let to_only = TemporalInterval::new(None, Some("2023-12-31T23:59:59".into()));
        assert!(valid_at(&[to_only.clone()], at(2022, 1, 1)));
        assert!(!valid_at(&[to_only], at(2024, 1, 1)));
    }

    #[test]
    fn descriptor_interval_is_always_valid() {
        let interval = TemporalInterval::new(
            Some("start of the wedding".into()),
            Some("end of the wedding".into()),
        );
        assert!(valid_at(&[interval], at(1800, 1, 1)));
    }
}
