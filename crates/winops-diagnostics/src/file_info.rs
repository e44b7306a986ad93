use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sample::PerformanceCounterSampleSet;

/// Summary of a counter log: time span and number of sample sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterFileInfo {
    oldest_record: DateTime<Utc>,
    newest_record: DateTime<Utc>,
    sample_count: u32,
}

impl Default for CounterFileInfo {
    fn default() -> Self {
        Self {
            oldest_record: DateTime::<Utc>::MIN_UTC,
            newest_record: DateTime::<Utc>::MAX_UTC,
            sample_count: 0,
        }
    }
}

impl CounterFileInfo {
    pub fn new(oldest_record: DateTime<Utc>, newest_record: DateTime<Utc>, sample_count: u32) -> Self {
        Self {
            oldest_record,
            newest_record,
            sample_count,
        }
    }

    /// Span and count of the given sets; the default info when empty.
    pub fn from_sample_sets(sets: &[PerformanceCounterSampleSet]) -> Self {
        let oldest = sets.iter().map(|s| s.timestamp).min();
        let newest = sets.iter().map(|s| s.timestamp).max();
        match (oldest, newest) {
            (Some(oldest), Some(newest)) => {
                Self::new(oldest, newest, u32::try_from(sets.len()).unwrap_or(u32::MAX))
            }
            _ => Self::default(),
        }
    }

    pub fn oldest_record(&self) -> DateTime<Utc> {
        self.oldest_record
    }

    pub fn newest_record(&self) -> DateTime<Utc> {
        self.newest_record
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default() {
        let info = CounterFileInfo::default();
        assert_eq!(info.oldest_record(), DateTime::<Utc>::MIN_UTC);
        assert_eq!(info.newest_record(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(info.sample_count(), 0);
    }

    #[test]
    fn test_from_sample_sets_unordered() {
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 15).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 30).unwrap();
        let sets = vec![
            PerformanceCounterSampleSet::new(t2, vec![]),
            PerformanceCounterSampleSet::new(t3, vec![]),
            PerformanceCounterSampleSet::new(t1, vec![]),
        ];
        let info = CounterFileInfo::from_sample_sets(&sets);
        assert_eq!(info.oldest_record(), t1);
        assert_eq!(info.newest_record(), t3);
        assert_eq!(info.sample_count(), 3);
    }

    #[test]
    fn test_from_no_sets_is_default() {
        assert_eq!(CounterFileInfo::from_sample_sets(&[]), CounterFileInfo::default());
    }
}
