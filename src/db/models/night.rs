//! Sleep night records.
//!
//! A night is "open" while `end_time_ms == start_time_ms`; stopping a night moves
//! its end time forward, which closes it for good.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Rating stored on nights that have not been rated yet.
pub const QUALITY_UNRATED: i32 = -1;

/// Highest rating the quality screen offers; ratings run `0..=QUALITY_MAX`.
pub const QUALITY_MAX: i32 = 5;

/// Store-assigned identifier of a night. Ids start at 1, so `NightId::NONE`
/// never resolves to a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NightId(pub i64);

impl NightId {
    pub const NONE: NightId = NightId(0);

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for NightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepNight {
    pub id: NightId,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub quality: i32,
}

impl SleepNight {
    /// A fresh, open night starting at `now_ms`. The id is assigned on insert.
    pub fn begin(now_ms: i64) -> Self {
        Self {
            id: NightId::NONE,
            start_time_ms: now_ms,
            end_time_ms: now_ms,
            quality: QUALITY_UNRATED,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time_ms == self.start_time_ms
    }

    pub fn is_rated(&self) -> bool {
        self.quality != QUALITY_UNRATED
    }

    /// Closes the night at `now_ms`. The end time always lands strictly after
    /// the start, so a stop within the same millisecond still closes it.
    pub fn finish(&mut self, now_ms: i64) {
        self.end_time_ms = now_ms.max(self.start_time_ms.saturating_add(1));
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_time_ms.saturating_sub(self.start_time_ms).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_night_is_open_and_unrated() {
        let night = SleepNight::begin(1_000);
        assert!(night.is_open());
        assert!(!night.is_rated());
        assert_eq!(night.id, NightId::NONE);
        assert_eq!(night.duration_ms(), 0);
    }

    #[test]
    fn finish_closes_even_within_the_same_millisecond() {
        let mut night = SleepNight::begin(5_000);
        night.finish(5_000);
        assert!(!night.is_open());
        assert_eq!(night.end_time_ms, 5_001);

        let mut later = SleepNight::begin(5_000);
        later.finish(65_000);
        assert_eq!(later.duration_ms(), 60_000);
    }

    #[test]
    fn finish_at_the_end_of_time_does_not_overflow() {
        let mut night = SleepNight::begin(i64::MAX);
        night.finish(i64::MAX);
        assert_eq!(night.end_time_ms, i64::MAX);
    }

    #[test]
    fn clock_skew_backwards_still_closes() {
        let mut night = SleepNight::begin(10_000);
        night.finish(9_000);
        assert!(night.end_time_ms > night.start_time_ms);
    }
}
