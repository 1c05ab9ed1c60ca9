// Trait for the collaborator that draws the dashboard
use crate::domain::dashboard::{DashboardFrame, StatusLine};

/// Receives dashboard updates. The controller never reads back from it.
pub trait RenderSink: Send + Sync {
    /// Replace everything on screen with this frame
    fn render(&self, frame: DashboardFrame);

    /// Update only the status line
    fn show_status(&self, status: StatusLine);
}
