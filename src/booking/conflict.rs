use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::Appointment;

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Builds `[start, end)` as given; callers keep `start <= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when the two intervals share at least one instant.
    pub fn overlaps(&self, other: &Interval) -> bool {
        ConflictDetector::overlaps(self.start, self.end, other.start, other.end)
    }
}

/// Overlap rule shared by slot listing and reservation.
///
/// Touching endpoints do not overlap. The SQL guard in
/// `SqliteStore::insert_if_slot_free` encodes the same predicate.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn overlaps(
        a_start: DateTime<Utc>,
        a_end: DateTime<Utc>,
        b_start: DateTime<Utc>,
        b_end: DateTime<Utc>,
    ) -> bool {
        a_start < b_end && b_start < a_end
    }

    /// First active appointment in `existing` overlapping `candidate`.
    pub fn first_conflict<'a>(
        candidate: &Interval,
        existing: &'a [Appointment],
    ) -> Option<&'a Appointment> {
        existing
            .iter()
            .filter(|a| a.status.is_active())
            .find(|a| a.interval().overlaps(candidate))
    }

    pub fn has_conflict(candidate: &Interval, existing: &[Appointment]) -> bool {
        Self::first_conflict(candidate, existing).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!ConflictDetector::overlaps(at(0), at(60), at(60), at(90)));
        assert!(!ConflictDetector::overlaps(at(60), at(90), at(0), at(60)));
    }

    #[test]
    fn test_interval_keeps_bounds_and_excludes_end() {
        let slot = Interval::new(at(0), at(60));
        assert_eq!((slot.start, slot.end), (at(0), at(60)));
        assert!(slot.overlaps(&Interval::new(at(59), at(61))));
        assert!(!slot.overlaps(&Interval::new(at(60), at(61))));
    }

    #[test]
    fn test_contained_and_partial_overlaps() {
        assert!(ConflictDetector::overlaps(at(0), at(60), at(30), at(90)));
        assert!(ConflictDetector::overlaps(at(0), at(120), at(30), at(60)));
        assert!(ConflictDetector::overlaps(at(30), at(60), at(0), at(120)));
        assert!(ConflictDetector::overlaps(at(0), at(60), at(0), at(60)));
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in 0i64..500, la in 1i64..200, b in 0i64..500, lb in 1i64..200) {
            prop_assert_eq!(
                ConflictDetector::overlaps(at(a), at(a + la), at(b), at(b + lb)),
                ConflictDetector::overlaps(at(b), at(b + lb), at(a), at(a + la))
            );
        }

        #[test]
        fn overlap_matches_shared_minute(a in 0i64..300, la in 1i64..120, b in 0i64..300, lb in 1i64..120) {
            let shared = (a..a + la).any(|m| m >= b && m < b + lb);
            prop_assert_eq!(ConflictDetector::overlaps(at(a), at(a + la), at(b), at(b + lb)), shared);
        }
    }
}
