// Trait for commands sent back to the telemetry server
use async_trait::async_trait;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Ask the server to discard its cached readings.
    /// Succeeds only when the server acknowledges with a success status.
    async fn request_reset(&self) -> anyhow::Result<()>;
}
