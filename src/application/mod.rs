// Application layer - Use cases and the seams they depend on
pub mod backoff;
pub mod connection_manager;
pub mod dashboard_controller;
pub mod render_sink;
pub mod telemetry_source;
