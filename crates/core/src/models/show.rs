//! Show model - a movie in a showroom over a time window

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub showroom_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Show {
    pub fn new(
        movie_id: Uuid,
        showroom_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            movie_id,
            showroom_id,
            start_time,
            end_time,
        }
    }

    /// Half-open interval overlap; touching boundaries do not overlap
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_overlap_rules() {
        let show = Show::new(Uuid::new_v4(), Uuid::new_v4(), at(15), at(17));
        assert!(show.overlaps(at(14), at(16)));
        assert!(show.overlaps(at(16), at(18)));
        assert!(show.overlaps(at(15), at(17)));
        assert!(!show.overlaps(at(17), at(19)));
        assert!(!show.overlaps(at(13), at(15)));
    }

    #[test]
    fn test_range_is_half_open() {
        let range = TimeRange::new(at(10), at(12));
        assert!(range.contains(at(10)));
        assert!(!range.contains(at(12)));
        assert!(TimeRange::new(at(12), at(12)).is_empty());
    }
}
