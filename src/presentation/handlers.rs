// HTTP request handlers
use crate::application::dashboard_controller::ControllerInput;
use crate::presentation::app_state::AppState;
use crate::presentation::frame_view::{dashboard_to_view, DashboardView};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Latest dashboard frame and status line
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let (frame, status) = state.frames.current();
    Json(dashboard_to_view(frame, status))
}

/// User-initiated reset: forwarded to the controller, which asks the
/// telemetry server first and clears local data only on success
pub async fn reset_dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (reply_tx, reply_rx) = oneshot::channel();

    if state
        .controller
        .send(ControllerInput::ResetRequested(reply_tx))
        .await
        .is_err()
    {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "dashboard controller is not running" })),
        );
    }

    match reply_rx.await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(json!({ "status": "Data reset successfully" })),
        ),
        Ok(Err(e)) => {
            tracing::warn!("Reset command failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Error resetting data" })),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "dashboard controller is not running" })),
        ),
    }
}
