// Render sink that keeps the latest frame for the HTTP surface
use crate::application::render_sink::RenderSink;
use crate::domain::dashboard::{DashboardFrame, StatusLine};
use std::sync::RwLock;

pub struct LatestFrameSink {
    frame: RwLock<Option<DashboardFrame>>,
    status: RwLock<StatusLine>,
}

impl LatestFrameSink {
    pub fn new() -> Self {
        Self {
            frame: RwLock::new(None),
            status: RwLock::new(StatusLine::info("Connecting to server...")),
        }
    }

    /// Latest frame (if any sample or reset has been rendered) and status line
    pub fn current(&self) -> (Option<DashboardFrame>, StatusLine) {
        let frame = self
            .frame
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let status = self
            .status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        (frame, status)
    }

    fn set_status(&self, status: StatusLine) {
        *self
            .status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }
}

impl Default for LatestFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LatestFrameSink {
    fn render(&self, frame: DashboardFrame) {
        tracing::debug!(
            "Rendering frame: {} charge samples, usb_alert={}",
            frame.charge.samples.len(),
            frame.usb_alert
        );
        self.set_status(frame.status.clone());
        *self
            .frame
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(frame);
    }

    fn show_status(&self, status: StatusLine) {
        tracing::info!("Status: {}", status.text);
        self.set_status(status);
    }
}
