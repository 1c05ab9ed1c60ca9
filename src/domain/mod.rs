// Domain layer - Pure telemetry and display models
pub mod battery_profile;
pub mod dashboard;
pub mod series;
pub mod telemetry;
pub mod trend;
