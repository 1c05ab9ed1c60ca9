// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod reset_client;
pub mod ws_transport;
