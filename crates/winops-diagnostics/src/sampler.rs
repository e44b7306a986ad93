//! Raw performance counter sampling via WMI.
//!
//! Queries a `Win32_PerfRawData_*` class, turns each instance row into one
//! [`PerformanceCounterSample`] per requested counter and cooks the values
//! against the previous pass for the same counter path.

use crate::calculator::cook;
use crate::sample::{
    filetime_to_datetime, PerformanceCounterSample, PerformanceCounterSampleSet,
    PerformanceCounterType,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use winops_wmi::wql::WqlBuilder;
use winops_wmi::{WmiErrorKind, WmiResult, WmiTransport};

const PROP_NAME: &str = "Name";
const PROP_PERF_TIME: &str = "Timestamp_PerfTime";
const PROP_PERF_FREQ: &str = "Frequency_PerfTime";
const PROP_SYS_100NS: &str = "Timestamp_Sys100NS";
const PROP_OBJECT_TIME: &str = "Timestamp_Object";
const PROP_OBJECT_FREQ: &str = "Frequency_Object";
const FREQ_100NS: u64 = 10_000_000;

// ─── Query Definition ────────────────────────────────────────────────

/// One counter within a raw-data class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDefinition {
    /// Display name used in the counter path, e.g. `% Processor Time`.
    pub name: String,
    /// WMI property holding the raw value, e.g. `PercentProcessorTime`.
    pub property: String,
    pub counter_type: PerformanceCounterType,
}

impl CounterDefinition {
    pub fn new(
        name: impl Into<String>,
        property: impl Into<String>,
        counter_type: PerformanceCounterType,
    ) -> Self {
        Self {
            name: name.into(),
            property: property.into(),
            counter_type,
        }
    }

    fn base_property(&self) -> Option<String> {
        use PerformanceCounterType::*;
        match self.counter_type {
            RawFraction | SampleFraction | AverageTimer32 | AverageCount64 | CounterMultiTimer
            | CounterMultiTimer100Ns | CounterMultiTimerInverse | CounterMultiTimer100NsInverse => {
                Some(format!("{}_Base", self.property))
            }
            _ => None,
        }
    }

    fn uses_100ns_clock(&self) -> bool {
        use PerformanceCounterType::*;
        matches!(
            self.counter_type,
            Timer100Ns | Timer100NsInverse | CounterMultiTimer100Ns | CounterMultiTimer100NsInverse
        )
    }

    fn is_multi_timer(&self) -> bool {
        use PerformanceCounterType::*;
        matches!(
            self.counter_type,
            CounterMultiTimer
                | CounterMultiTimer100Ns
                | CounterMultiTimerInverse
                | CounterMultiTimer100NsInverse
        )
    }
}

/// Which class to sample on which computer, and which counters to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterQuery {
    pub computer_name: String,
    /// Performance object name used in paths, e.g. `Processor`.
    pub object: String,
    /// e.g. `Win32_PerfRawData_PerfOS_Processor`
    pub wmi_class: String,
    pub counters: Vec<CounterDefinition>,
    /// Restrict to one instance (`Name = '<instance>'`).
    #[serde(default)]
    pub instance: Option<String>,
}

impl CounterQuery {
    pub fn to_wql(&self) -> String {
        let mut fields: Vec<String> = vec![
            PROP_NAME.into(),
            PROP_PERF_TIME.into(),
            PROP_PERF_FREQ.into(),
            PROP_SYS_100NS.into(),
        ];
        for c in &self.counters {
            fields.push(c.property.clone());
            if let Some(base) = c.base_property() {
                fields.push(base);
            }
            if c.counter_type == PerformanceCounterType::ElapsedTime {
                fields.push(PROP_OBJECT_TIME.into());
                fields.push(PROP_OBJECT_FREQ.into());
            }
        }
        let mut b = WqlBuilder::select(&self.wmi_class).fields(&fields);
        if let Some(ref instance) = self.instance {
            b = b.where_eq(PROP_NAME, instance);
        }
        b.build()
    }

    /// `\\<computer>\<object>(<instance>)\<counter>`; no parentheses for
    /// single-instance objects.
    pub fn counter_path(&self, instance: &str, counter: &str) -> String {
        if instance.is_empty() {
            format!(r"\\{}\{}\{}", self.computer_name, self.object, counter)
        } else {
            format!(r"\\{}\{}({})\{}", self.computer_name, self.object, instance, counter)
        }
    }
}

// ─── Sampler ─────────────────────────────────────────────────────────

/// Samples one [`CounterQuery`] repeatedly, keeping the previous raw
/// values so rate and timer counters can be cooked.
#[derive(Debug)]
pub struct CounterSampler {
    query: CounterQuery,
    previous: HashMap<String, PerformanceCounterSample>,
}

impl CounterSampler {
    pub fn new(query: CounterQuery) -> Self {
        Self {
            query,
            previous: HashMap::new(),
        }
    }

    pub fn query(&self) -> &CounterQuery {
        &self.query
    }

    /// Take one pass over the class.
    pub async fn sample(
        &mut self,
        transport: &mut WmiTransport,
    ) -> WmiResult<PerformanceCounterSampleSet> {
        let wql = self.query.to_wql();
        debug!("Counter sample query: {}", wql);
        let rows = transport.wql_query(&wql).await?;
        Ok(self.ingest(&rows))
    }

    /// Take `count` passes spaced by `interval`. Stops early, returning the
    /// passes gathered so far, when `cancel` fires; a pass in flight is
    /// abandoned.
    pub async fn sample_continuous(
        &mut self,
        transport: &mut WmiTransport,
        count: usize,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> WmiResult<Vec<PerformanceCounterSampleSet>> {
        let mut sets = Vec::with_capacity(count);
        for pass in 0..count {
            if pass > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            let pass_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.sample(transport) => res,
            };
            match pass_result {
                Ok(set) => sets.push(set),
                Err(e) if e.kind == WmiErrorKind::Cancelled => break,
                Err(e) => return Err(e),
            }
        }
        if sets.len() < count {
            warn!(
                "Counter sampling for {} stopped after {} of {} passes",
                self.query.object,
                sets.len(),
                count
            );
        }
        Ok(sets)
    }

    /// Build a sample set from query rows and remember it for the next pass.
    pub fn ingest(&mut self, rows: &[HashMap<String, String>]) -> PerformanceCounterSampleSet {
        let timestamp = rows
            .iter()
            .find_map(|r| parse_u64_opt(r, PROP_SYS_100NS))
            .and_then(filetime_to_datetime)
            .unwrap_or_else(Utc::now);

        let mut samples = Vec::with_capacity(rows.len() * self.query.counters.len());
        for row in rows {
            let instance = row.get(PROP_NAME).cloned().unwrap_or_default();
            for counter in &self.query.counters {
                let path = self.query.counter_path(&instance, &counter.name);
                let mut sample = raw_sample(row, counter, &path, &instance, timestamp);
                sample.cooked_value = cook(self.previous.get(&path), &sample).unwrap_or(0.0);
                samples.push(sample);
            }
        }

        for s in &samples {
            self.previous.insert(s.path.clone(), s.clone());
        }
        PerformanceCounterSampleSet::new(timestamp, samples)
    }
}

fn raw_sample(
    row: &HashMap<String, String>,
    counter: &CounterDefinition,
    path: &str,
    instance: &str,
    timestamp: DateTime<Utc>,
) -> PerformanceCounterSample {
    let sys_100ns = parse_u64(row, PROP_SYS_100NS);
    let base = counter.base_property().map(|p| parse_u64(row, &p));

    let (second_value, time_base) = if counter.counter_type == PerformanceCounterType::ElapsedTime {
        (parse_u64(row, PROP_OBJECT_TIME), parse_u64(row, PROP_OBJECT_FREQ))
    } else if counter.uses_100ns_clock() {
        (sys_100ns, FREQ_100NS)
    } else if let (Some(b), false) = (base, counter.is_multi_timer()) {
        (b, parse_u64(row, PROP_PERF_FREQ))
    } else {
        (parse_u64(row, PROP_PERF_TIME), parse_u64(row, PROP_PERF_FREQ))
    };

    let multiple_count = if counter.is_multi_timer() {
        base.and_then(|b| u32::try_from(b).ok()).unwrap_or(1)
    } else {
        1
    };

    PerformanceCounterSample {
        path: path.to_string(),
        instance_name: instance.to_string(),
        raw_value: parse_u64(row, &counter.property),
        second_value,
        multiple_count,
        counter_type: counter.counter_type,
        time_base,
        timestamp,
        timestamp_100nsec: sys_100ns,
        ..Default::default()
    }
}

// ─── Parse Helpers ───────────────────────────────────────────────────

fn parse_u64(row: &HashMap<String, String>, key: &str) -> u64 {
    parse_u64_opt(row, key).unwrap_or(0)
}

fn parse_u64_opt(row: &HashMap<String, String>, key: &str) -> Option<u64> {
    row.get(key).and_then(|v| v.trim().parse::<u64>().ok())
}
