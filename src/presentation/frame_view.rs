// Mapper to convert dashboard frames to their JSON view
use crate::domain::battery_profile::VoltageLevel;
use crate::domain::dashboard::{DashboardFrame, SeriesSnapshot, StatusKind, StatusLine, VoltageDisplay};
use crate::domain::series::Metric;
use crate::domain::trend::segment_color;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub status: StatusView,
    pub usb_alert: bool,
    pub charge: SeriesView,
    pub voltage: SeriesView,
    pub temperature: SeriesView,
    /// One color per charge line segment
    pub charge_segments: Vec<&'static str>,
    pub voltage_display: Option<VoltageDisplayView>,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub text: String,
    pub kind: StatusKind,
}

#[derive(Debug, Serialize)]
pub struct SeriesView {
    pub metric: Metric,
    pub label: String,
    pub points: Vec<PointView>,
}

#[derive(Debug, Serialize)]
pub struct PointView {
    pub time_ms: i64,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct VoltageDisplayView {
    pub chemistry: String,
    pub label: String,
    pub color: &'static str,
    pub y_min: f64,
    pub y_max: f64,
    pub level: Option<VoltageLevel>,
}

pub fn dashboard_to_view(frame: Option<DashboardFrame>, status: StatusLine) -> DashboardView {
    let frame = frame.unwrap_or_else(|| DashboardFrame::empty(status.clone()));

    DashboardView {
        status: StatusView {
            text: status.text,
            kind: status.kind,
        },
        usb_alert: frame.usb_alert,
        charge: series_to_view(frame.charge),
        voltage: series_to_view(frame.voltage),
        temperature: series_to_view(frame.temperature),
        charge_segments: frame.charge_trend.iter().map(|c| segment_color(*c)).collect(),
        voltage_display: frame.voltage_display.map(voltage_display_to_view),
    }
}

fn series_to_view(series: SeriesSnapshot) -> SeriesView {
    let metric = series.metric;
    let points = series
        .samples
        .into_iter()
        .map(|s| PointView {
            time_ms: s.timestamp.timestamp_millis(),
            value: s.value,
        })
        .collect();

    SeriesView {
        metric,
        label: format!("{} ({})", metric.label(), metric.unit()),
        points,
    }
}

fn voltage_display_to_view(display: VoltageDisplay) -> VoltageDisplayView {
    VoltageDisplayView {
        chemistry: display.chemistry,
        label: display.label,
        color: display.color,
        y_min: display.axis_min,
        y_max: display.axis_max,
        level: display.level,
    }
}
