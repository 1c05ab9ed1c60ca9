// Dashboard controller - Owns the live series and turns stream events into frames
use crate::application::connection_manager::SourceEvent;
use crate::application::render_sink::RenderSink;
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::battery_profile::lookup;
use crate::domain::dashboard::{DashboardFrame, SeriesSnapshot, StatusLine, VoltageDisplay};
use crate::domain::series::{RetentionPolicy, SeriesSet};
use crate::domain::telemetry::{DecodeError, TelemetryReading};
use crate::domain::trend::classify;
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Everything the controller task processes, one at a time
#[derive(Debug)]
pub enum ControllerInput {
    Source(SourceEvent),
    ResetRequested(oneshot::Sender<Result<(), String>>),
}

pub struct DashboardController {
    series: SeriesSet,
    usb_alert: bool,
    status: StatusLine,
    voltage_axis_margin: u32,
    sink: Arc<dyn RenderSink>,
    source: Arc<dyn TelemetrySource>,
}

impl DashboardController {
    pub fn new(
        policy: RetentionPolicy,
        voltage_axis_margin: u32,
        sink: Arc<dyn RenderSink>,
        source: Arc<dyn TelemetrySource>,
    ) -> Self {
        Self {
            series: SeriesSet::new(policy),
            usb_alert: false,
            status: StatusLine::info("Connecting to server..."),
            voltage_axis_margin,
            sink,
            source,
        }
    }

    pub fn series(&self) -> &SeriesSet {
        &self.series
    }

    pub fn usb_alert(&self) -> bool {
        self.usb_alert
    }

    /// Process inputs until every sender is dropped
    pub async fn run(mut self, mut inputs: mpsc::Receiver<ControllerInput>) {
        while let Some(input) = inputs.recv().await {
            match input {
                ControllerInput::Source(event) => self.handle(event, Utc::now()),
                ControllerInput::ResetRequested(reply) => {
                    let outcome = self.request_reset().await.map_err(|e| format!("{:#}", e));
                    let _ = reply.send(outcome);
                }
            }
        }
        tracing::debug!("Dashboard controller stopped");
    }

    pub fn handle(&mut self, event: SourceEvent, now: DateTime<Utc>) {
        match event {
            SourceEvent::Connected => self.on_connected(),
            SourceEvent::Disconnected { reconnecting } => self.on_disconnected(reconnecting),
            SourceEvent::Reset => self.on_reset(),
            SourceEvent::Reading(reading) => self.on_sample(reading, now),
            SourceEvent::DecodeError(e) => self.on_decode_error(&e),
        }
    }

    pub fn on_connected(&mut self) {
        self.show_status(StatusLine::connected("Connected to server"));
    }

    pub fn on_disconnected(&mut self, reconnecting: bool) {
        let text = if reconnecting {
            "Disconnected from server - Reconnecting..."
        } else {
            "Disconnected from server"
        };
        self.show_status(StatusLine::error(text));
    }

    pub fn on_sample(&mut self, reading: TelemetryReading, now: DateTime<Utc>) {
        self.series.append_reading(&reading);
        self.series.prune_all(now);
        self.usb_alert = reading.usb_alert;

        let profile = lookup(&reading.battery_chemistry);
        let voltage_display = VoltageDisplay::new(
            &reading.battery_chemistry,
            profile,
            self.voltage_axis_margin,
            reading.voltage,
        );

        let updated_at = reading.timestamp.with_timezone(&Local).format("%H:%M:%S");
        self.status = StatusLine::connected(format!("Last update: {}", updated_at));

        let charge = SeriesSnapshot::from(&self.series.charge);
        let charge_trend = classify(&charge.samples);

        self.sink.render(DashboardFrame {
            charge,
            voltage: SeriesSnapshot::from(&self.series.voltage),
            temperature: SeriesSnapshot::from(&self.series.temperature),
            charge_trend,
            voltage_display: Some(voltage_display),
            usb_alert: self.usb_alert,
            status: self.status.clone(),
        });
    }

    /// Server-directed reset: unconditional, the status line is left as it was
    pub fn on_reset(&mut self) {
        tracing::info!("Reset directive received, clearing dashboard");
        self.clear(self.status.clone());
    }

    pub fn on_decode_error(&mut self, error: &DecodeError) {
        self.show_status(StatusLine::error(format!("Ignored malformed message: {}", error)));
    }

    /// User-initiated reset. Local state is cleared only after the server
    /// confirms; on failure nothing changes except the status line.
    pub async fn request_reset(&mut self) -> anyhow::Result<()> {
        let outcome = self.source.request_reset().await;
        match outcome {
            Ok(()) => {
                self.clear(StatusLine::info("Data reset successfully"));
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error resetting data: {:#}", e);
                self.show_status(StatusLine::error("Error resetting data"));
                Err(e)
            }
        }
    }

    fn clear(&mut self, status: StatusLine) {
        self.series.clear_all();
        self.usb_alert = false;
        self.status = status.clone();
        self.sink.render(DashboardFrame::empty(status));
    }

    fn show_status(&mut self, status: StatusLine) {
        self.status = status.clone();
        self.sink.show_status(status);
    }
}
