// Presentation layer - HTTP and WebSocket endpoints
pub mod app_state;
pub mod handlers;
