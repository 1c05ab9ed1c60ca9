// Application state for HTTP handlers
use crate::application::dashboard_controller::ControllerInput;
use crate::presentation::frame_sink::LatestFrameSink;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    pub frames: Arc<LatestFrameSink>,
    pub controller: mpsc::Sender<ControllerInput>,
}
