//! Cooked-value calculation from raw counter samples.
//!
//! Field roles inside a [`PerformanceCounterSample`]:
//!
//! | field | meaning |
//! |---|---|
//! | `raw_value` | counter value `N` |
//! | `second_value` | performance-clock time `T` for timer/rate types, base `B` for fraction and average types |
//! | `timestamp_100nsec` | system time in 100 ns units for the `*100Ns*` types |
//! | `time_base` | performance-clock frequency `F` (ticks per second) |
//! | `multiple_count` | instance multiplier for the multi-timer types |
//!
//! A counter that wrapped or was reset between samples (negative delta),
//! or a zero time/base delta, yields `None`.

use crate::sample::{PerformanceCounterSample, PerformanceCounterType};

/// Whether computing a value needs a previous sample.
pub fn needs_two_samples(counter_type: PerformanceCounterType) -> bool {
    use PerformanceCounterType::*;
    !matches!(
        counter_type,
        NumberOfItemsHex32
            | NumberOfItemsHex64
            | NumberOfItems32
            | NumberOfItems64
            | RawFraction
            | ElapsedTime
            | Unknown(_)
    ) && !counter_type.is_base()
}

fn delta(new: u64, old: u64) -> Option<f64> {
    new.checked_sub(old).map(|d| d as f64)
}

fn nonzero(v: f64) -> Option<f64> {
    if v > 0.0 {
        Some(v)
    } else {
        None
    }
}

/// Cooked value of `current`, using `previous` for the delta-based types.
pub fn cook(
    previous: Option<&PerformanceCounterSample>,
    current: &PerformanceCounterSample,
) -> Option<f64> {
    use PerformanceCounterType::*;

    let n1 = current.raw_value;
    let freq = current.time_base as f64;

    match current.counter_type {
        NumberOfItemsHex32 | NumberOfItemsHex64 | NumberOfItems32 | NumberOfItems64 => {
            return Some(n1 as f64)
        }
        RawFraction => {
            let base = nonzero(current.second_value as f64)?;
            return Some(100.0 * n1 as f64 / base);
        }
        ElapsedTime => {
            let freq = nonzero(freq)?;
            return delta(current.second_value, n1).map(|d| d / freq);
        }
        SampleBase | AverageBase | RawBase | CounterMultiBase | Unknown(_) => return None,
        _ => {}
    }

    let prev = previous?;
    let dn = delta(n1, prev.raw_value)?;
    let dt = delta(current.second_value, prev.second_value);
    let dt100 = delta(current.timestamp_100nsec, prev.timestamp_100nsec);
    let multi = current.multiple_count as f64;

    let value = match current.counter_type {
        CounterDelta32 | CounterDelta64 => dn,
        SampleCounter | RateOfCountsPerSecond32 | RateOfCountsPerSecond64 => {
            let secs = nonzero(dt? / nonzero(freq)?)?;
            dn / secs
        }
        CountPerTimeInterval32 | CountPerTimeInterval64 => dn / nonzero(dt?)?,
        CounterTimer => 100.0 * dn / nonzero(dt?)?,
        CounterTimerInverse => 100.0 * (1.0 - dn / nonzero(dt?)?),
        Timer100Ns => 100.0 * dn / nonzero(dt100?)?,
        Timer100NsInverse => 100.0 * (1.0 - dn / nonzero(dt100?)?),
        SampleFraction => 100.0 * dn / nonzero(dt?)?,
        AverageTimer32 => (dn / nonzero(freq)?) / nonzero(dt?)?,
        AverageCount64 => dn / nonzero(dt?)?,
        CounterMultiTimer => {
            let secs = nonzero(dt? / nonzero(freq)?)?;
            100.0 * (dn / secs) / nonzero(multi)?
        }
        CounterMultiTimer100Ns => 100.0 * (dn / nonzero(dt100?)?) / nonzero(multi)?,
        CounterMultiTimerInverse => {
            let secs = nonzero(dt? / nonzero(freq)?)?;
            100.0 * (multi - dn / secs)
        }
        CounterMultiTimer100NsInverse => 100.0 * (multi - dn / nonzero(dt100?)?),
        _ => return None,
    };

    // Inverse timers can dip slightly below zero from clock skew.
    Some(value.max(0.0))
}
