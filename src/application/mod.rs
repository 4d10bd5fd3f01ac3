// Application layer - Replay core and use cases
pub mod aggregator;
pub mod render_sink;
pub mod replay_loop;
pub mod series_filter;
pub mod streaming_service;
pub mod telemetry_repository;
pub mod trail_window;
pub mod vehicle_service;

#[cfg(test)]
pub mod testing;
