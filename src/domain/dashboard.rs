// Dashboard domain model - what the render sink receives
use super::battery_profile::{BatteryProfile, VoltageLevel};
use super::series::{Metric, Series};
use super::telemetry::Sample;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Connected,
    Error,
    Info,
}

/// Human-readable status line shown next to the charts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub kind: StatusKind,
}

impl StatusLine {
    pub fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn connected(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Connected)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Error)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Info)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub metric: Metric,
    pub samples: Vec<Sample>,
}

impl From<&Series> for SeriesSnapshot {
    fn from(series: &Series) -> Self {
        Self {
            metric: series.metric(),
            samples: series.snapshot(),
        }
    }
}

/// Chemistry-derived styling for the voltage chart
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageDisplay {
    pub chemistry: String,
    pub label: String,
    pub color: &'static str,
    pub axis_min: f64,
    pub axis_max: f64,
    pub level: Option<VoltageLevel>,
}

impl VoltageDisplay {
    pub fn new(chemistry: &str, profile: &BatteryProfile, axis_margin: u32, voltage: f64) -> Self {
        Self {
            chemistry: chemistry.to_string(),
            label: format!("Voltage (V) - {}", chemistry.to_uppercase()),
            color: profile.color,
            axis_min: 0.0,
            axis_max: profile.voltage_axis_max(axis_margin),
            level: profile.level_for(voltage),
        }
    }
}

/// One complete render-sink update
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardFrame {
    pub charge: SeriesSnapshot,
    pub voltage: SeriesSnapshot,
    pub temperature: SeriesSnapshot,
    pub charge_trend: Vec<bool>,
    pub voltage_display: Option<VoltageDisplay>,
    pub usb_alert: bool,
    pub status: StatusLine,
}

impl DashboardFrame {
    /// Frame with no samples, used after any reset
    pub fn empty(status: StatusLine) -> Self {
        Self {
            charge: SeriesSnapshot::empty(Metric::Charge),
            voltage: SeriesSnapshot::empty(Metric::Voltage),
            temperature: SeriesSnapshot::empty(Metric::Temperature),
            charge_trend: Vec::new(),
            voltage_display: None,
            usb_alert: false,
            status,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.charge.samples.is_empty()
            && self.voltage.samples.is_empty()
            && self.temperature.samples.is_empty()
    }
}

impl SeriesSnapshot {
    pub fn empty(metric: Metric) -> Self {
        Self {
            metric,
            samples: Vec::new(),
        }
    }
}
