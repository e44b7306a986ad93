//! # winops – Performance diagnostics
//!
//! Counter sample data model plus the pieces that produce and consume it:
//!
//! - **Samples** – `PerformanceCounterSample` / `PerformanceCounterSampleSet`
//! - **File info** – time span and count of a counter log
//! - **Calculator** – cooked values from raw samples, per counter type
//! - **Sampler** – raw counters from `Win32_PerfRawData_*` over WMI
//! - **Counter logs** – PDH-CSV / PDH-TSV import

pub mod calculator;
pub mod csv_log;
pub mod file_info;
pub mod sample;
pub mod sampler;

pub use calculator::cook;
pub use csv_log::{parse_counter_log, read_counter_log, CounterLog, CounterLogError, CounterLogFormat};
pub use file_info::CounterFileInfo;
pub use sample::{PerformanceCounterSample, PerformanceCounterSampleSet, PerformanceCounterType};
pub use sampler::{CounterDefinition, CounterQuery, CounterSampler};
