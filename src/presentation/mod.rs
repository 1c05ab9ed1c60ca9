// Presentation layer - HTTP surface and render sink
pub mod app_state;
pub mod frame_sink;
pub mod frame_view;
pub mod handlers;
