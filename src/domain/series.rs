// Bounded time-series store for the live charts
use super::telemetry::{Sample, TelemetryReading};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Which samples survive a prune. Chosen once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep samples no older than the window, relative to `now`
    TimeWindow(TimeDelta),
    /// Keep only the most recent N samples
    CountLimited(usize),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::CountLimited(20)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Charge,
    Voltage,
    Temperature,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Charge => "Milliamp Hours",
            Metric::Voltage => "Voltage",
            Metric::Temperature => "Temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Charge => "mAh",
            Metric::Voltage => "V",
            Metric::Temperature => "°C",
        }
    }
}

/// Ordered samples for one metric.
///
/// Appends must arrive in non-decreasing timestamp order; ordering is
/// enforced by the connection layer and not re-checked here.
#[derive(Debug, Clone)]
pub struct Series {
    metric: Metric,
    samples: VecDeque<Sample>,
}

impl Series {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            samples: VecDeque::new(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
    }

    pub fn prune(&mut self, policy: RetentionPolicy, now: DateTime<Utc>) {
        match policy {
            RetentionPolicy::TimeWindow(window) => {
                let Some(cutoff) = now.checked_sub_signed(window) else {
                    return;
                };
                while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
                    self.samples.pop_front();
                }
            }
            RetentionPolicy::CountLimited(max) => {
                let excess = self.samples.len().saturating_sub(max);
                self.samples.drain(..excess);
            }
        }
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The three dashboard series, pruned together under one policy
#[derive(Debug, Clone)]
pub struct SeriesSet {
    policy: RetentionPolicy,
    pub charge: Series,
    pub voltage: Series,
    pub temperature: Series,
}

impl SeriesSet {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            charge: Series::new(Metric::Charge),
            voltage: Series::new(Metric::Voltage),
            temperature: Series::new(Metric::Temperature),
        }
    }

    pub fn append_reading(&mut self, reading: &TelemetryReading) {
        let at = reading.timestamp;
        self.charge.append(Sample::new(at, reading.milliamp_hours));
        self.voltage.append(Sample::new(at, reading.voltage));
        self.temperature.append(Sample::new(at, reading.temperature));
    }

    pub fn prune_all(&mut self, now: DateTime<Utc>) {
        let policy = self.policy;
        for series in [&mut self.charge, &mut self.voltage, &mut self.temperature] {
            series.prune(policy, now);
        }
    }

    pub fn clear_all(&mut self) {
        self.charge.clear();
        self.voltage.clear();
        self.temperature.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.charge.is_empty() && self.voltage.is_empty() && self.temperature.is_empty()
    }
}
