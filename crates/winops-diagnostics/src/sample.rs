//! Counter sample records.
//!
//! These are the values a performance-counter query hands back to its
//! caller: one [`PerformanceCounterSample`] per counter instance, grouped in
//! a [`PerformanceCounterSampleSet`] per collection pass. They carry no
//! behaviour; the query layer is trusted to fill them with well-formed
//! values.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// 100 ns intervals between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;

// ─── Counter Type ────────────────────────────────────────────────────

/// Windows performance counter types, with their native numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceCounterType {
    #[default]
    NumberOfItemsHex32,
    NumberOfItemsHex64,
    NumberOfItems32,
    NumberOfItems64,
    CounterDelta32,
    CounterDelta64,
    SampleCounter,
    CountPerTimeInterval32,
    CountPerTimeInterval64,
    RateOfCountsPerSecond32,
    RateOfCountsPerSecond64,
    RawFraction,
    CounterTimer,
    Timer100Ns,
    SampleFraction,
    CounterTimerInverse,
    Timer100NsInverse,
    CounterMultiTimer,
    CounterMultiTimer100Ns,
    CounterMultiTimerInverse,
    CounterMultiTimer100NsInverse,
    AverageTimer32,
    ElapsedTime,
    AverageCount64,
    SampleBase,
    AverageBase,
    RawBase,
    CounterMultiBase,
    /// A type code this crate does not know.
    Unknown(u32),
}

const TYPE_CODES: &[(PerformanceCounterType, u32)] = &[
    (PerformanceCounterType::NumberOfItemsHex32, 0),
    (PerformanceCounterType::NumberOfItemsHex64, 256),
    (PerformanceCounterType::NumberOfItems32, 65_536),
    (PerformanceCounterType::NumberOfItems64, 65_792),
    (PerformanceCounterType::CounterDelta32, 4_195_328),
    (PerformanceCounterType::CounterDelta64, 4_195_584),
    (PerformanceCounterType::SampleCounter, 4_260_864),
    (PerformanceCounterType::CountPerTimeInterval32, 4_523_008),
    (PerformanceCounterType::CountPerTimeInterval64, 4_523_264),
    (PerformanceCounterType::RateOfCountsPerSecond32, 272_696_320),
    (PerformanceCounterType::RateOfCountsPerSecond64, 272_696_576),
    (PerformanceCounterType::RawFraction, 537_003_008),
    (PerformanceCounterType::CounterTimer, 541_132_032),
    (PerformanceCounterType::Timer100Ns, 542_180_608),
    (PerformanceCounterType::SampleFraction, 549_585_920),
    (PerformanceCounterType::CounterTimerInverse, 557_909_248),
    (PerformanceCounterType::Timer100NsInverse, 558_957_824),
    (PerformanceCounterType::CounterMultiTimer, 574_686_464),
    (PerformanceCounterType::CounterMultiTimer100Ns, 575_735_040),
    (PerformanceCounterType::CounterMultiTimerInverse, 591_463_680),
    (PerformanceCounterType::CounterMultiTimer100NsInverse, 592_512_768),
    (PerformanceCounterType::AverageTimer32, 805_438_464),
    (PerformanceCounterType::ElapsedTime, 807_666_944),
    (PerformanceCounterType::AverageCount64, 1_073_874_176),
    (PerformanceCounterType::SampleBase, 1_073_939_457),
    (PerformanceCounterType::AverageBase, 1_073_939_458),
    (PerformanceCounterType::RawBase, 1_073_939_459),
    (PerformanceCounterType::CounterMultiBase, 1_107_494_144),
];

impl PerformanceCounterType {
    pub fn from_raw(code: u32) -> Self {
        TYPE_CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(t, _)| *t)
            .unwrap_or(Self::Unknown(code))
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::Unknown(code) => *code,
            known => TYPE_CODES
                .iter()
                .find(|(t, _)| t == known)
                .map(|(_, c)| *c)
                .unwrap_or_default(),
        }
    }

    /// Base counters only exist as denominators for another counter.
    pub fn is_base(&self) -> bool {
        matches!(
            self,
            Self::SampleBase | Self::AverageBase | Self::RawBase | Self::CounterMultiBase
        )
    }
}

// ─── Sample ──────────────────────────────────────────────────────────

/// One observation of one counter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceCounterSample {
    pub path: String,
    pub instance_name: String,
    pub cooked_value: f64,
    pub raw_value: u64,
    pub second_value: u64,
    pub multiple_count: u32,
    pub counter_type: PerformanceCounterType,
    pub default_scale: u32,
    pub time_base: u64,
    pub timestamp: DateTime<Utc>,
    pub timestamp_100nsec: u64,
    /// Native PDH status of the value (0 = valid).
    pub status: u32,
}

impl Default for PerformanceCounterSample {
    fn default() -> Self {
        Self {
            path: String::new(),
            instance_name: String::new(),
            cooked_value: 0.0,
            raw_value: 0,
            second_value: 0,
            multiple_count: 0,
            counter_type: PerformanceCounterType::default(),
            default_scale: 0,
            time_base: 0,
            timestamp: DateTime::<Utc>::MIN_UTC,
            timestamp_100nsec: 0,
            status: 0,
        }
    }
}

impl PerformanceCounterSample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: impl Into<String>,
        instance_name: impl Into<String>,
        cooked_value: f64,
        raw_value: u64,
        second_value: u64,
        multiple_count: u32,
        counter_type: PerformanceCounterType,
        default_scale: u32,
        time_base: u64,
        timestamp: DateTime<Utc>,
        timestamp_100nsec: u64,
        status: u32,
    ) -> Self {
        Self {
            path: path.into(),
            instance_name: instance_name.into(),
            cooked_value,
            raw_value,
            second_value,
            multiple_count,
            counter_type,
            default_scale,
            time_base,
            timestamp,
            timestamp_100nsec,
            status,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == 0
    }
}

// ─── Sample Set ──────────────────────────────────────────────────────

/// The samples gathered by one collection pass; all share `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceCounterSampleSet {
    pub timestamp: DateTime<Utc>,
    pub counter_samples: Vec<PerformanceCounterSample>,
}

impl Default for PerformanceCounterSampleSet {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::MIN_UTC,
            counter_samples: Vec::new(),
        }
    }
}

impl PerformanceCounterSampleSet {
    pub fn new(timestamp: DateTime<Utc>, counter_samples: Vec<PerformanceCounterSample>) -> Self {
        Self { timestamp, counter_samples }
    }

    pub fn len(&self) -> usize {
        self.counter_samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counter_samples.is_empty()
    }

    /// Sample whose path matches case-insensitively.
    pub fn find(&self, path: &str) -> Option<&PerformanceCounterSample> {
        self.counter_samples
            .iter()
            .find(|s| s.path.eq_ignore_ascii_case(path))
    }
}

// ─── Time conversions ────────────────────────────────────────────────

/// Convert a FILETIME tick count (100 ns since 1601-01-01 UTC).
pub fn filetime_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    let since_unix = i128::from(ticks) - i128::from(FILETIME_UNIX_EPOCH_TICKS);
    let secs = i64::try_from(since_unix.div_euclid(10_000_000)).ok()?;
    let nanos = (since_unix.rem_euclid(10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// Convert a time to FILETIME ticks; `None` before 1601.
pub fn datetime_to_filetime(dt: &DateTime<Utc>) -> Option<u64> {
    let secs = dt.timestamp();
    let ticks_since_unix = secs
        .checked_mul(10_000_000)?
        .checked_add(i64::from(dt.timestamp_subsec_nanos() / 100))?;
    let ticks = ticks_since_unix.checked_add(FILETIME_UNIX_EPOCH_TICKS as i64)?;
    u64::try_from(ticks).ok()
}
