//! Timestamp helpers shared by clocks and the synchronizer.

use chrono::{DateTime, TimeDelta, Utc};

/// An absolute simulation instant.
pub type Timestamp = DateTime<Utc>;

/// Earliest representable timestamp, used when no epoch has been configured.
pub const MINIMUM_TIMESTAMP: Timestamp = DateTime::<Utc>::MIN_UTC;

/// Returns the signed number of seconds from `earlier` to `later`.
///
/// The result is negative when `later` precedes `earlier`.
pub fn seconds_between(later: Timestamp, earlier: Timestamp) -> f64 {
    let delta = later.signed_duration_since(earlier);
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1_000_000_000.0
}

/// Shifts `time` by a signed, fractional number of seconds.
///
/// Returns `None` if the result falls outside the representable range.
pub fn offset_by_seconds(time: Timestamp, seconds: f64) -> Option<Timestamp> {
    if !seconds.is_finite() {
        return None;
    }
    let nanos = (seconds * 1_000_000_000.0).round();
    if nanos.abs() >= i64::MAX as f64 {
        return None;
    }
    time.checked_add_signed(TimeDelta::nanoseconds(nanos as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> Timestamp {
        "2015-11-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn seconds_between_is_signed() {
        let later = offset_by_seconds(epoch(), 10.5).unwrap();
        assert_eq!(seconds_between(later, epoch()), 10.5);
        assert_eq!(seconds_between(epoch(), later), -10.5);
    }

    #[test]
    fn minimum_timestamp_precedes_everything() {
        assert!(seconds_between(epoch(), MINIMUM_TIMESTAMP) > 0.0);
    }

    #[test]
    fn offset_rejects_non_finite_values() {
        assert!(offset_by_seconds(epoch(), f64::NAN).is_none());
        assert!(offset_by_seconds(epoch(), f64::INFINITY).is_none());
    }
}
