// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::streaming_service::StreamingReplayService;
use crate::application::telemetry_repository::TelemetryRepository;
use crate::application::vehicle_service::VehicleService;
use crate::infrastructure::config::{SourceKind, load_dashboard_config, load_service_config};
use crate::infrastructure::file_repository::FileRepository;
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, list_vehicles, live_dashboard, stream_replay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let service_config = load_service_config()?;
    let dashboard_config = load_dashboard_config()?;

    // Create repository (infrastructure layer)
    let repository: Arc<dyn TelemetryRepository> = match service_config.source.kind {
        SourceKind::Influx => {
            let influx = service_config
                .influx
                .context("source.kind is influx but [influx] is missing")?;
            Arc::new(InfluxRepository::new(influx))
        }
        SourceKind::File => {
            let file = service_config
                .file
                .context("source.kind is file but [file] is missing")?;
            Arc::new(FileRepository::new(file.path))
        }
    };

    // Create services (application layer)
    let window = service_config.window;
    let vehicle_service = VehicleService::new(repository.clone(), window);
    let streaming_service = StreamingReplayService::new(repository, dashboard_config, window);

    // Create application state
    let state = Arc::new(AppState {
        vehicle_service,
        streaming_service,
    });

    // Build router (presentation layer)
    // Replay frames are compressed one by one, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/vehicles", get(list_vehicles))
        .route("/replays/:id", get(stream_replay))
        .route("/live", get(live_dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = service_config.server.bind;
    tracing::info!("Starting fleet-replay service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
