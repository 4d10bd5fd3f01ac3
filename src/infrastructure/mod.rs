// Infrastructure layer - External dependencies and adapters
pub mod channel_sink;
pub mod chunked_frames;
pub mod config;
pub mod file_repository;
pub mod http_response;
pub mod influx_repository;
pub mod stream_message;
