// Application state for HTTP handlers
use crate::application::streaming_service::StreamingReplayService;
use crate::application::vehicle_service::VehicleService;

#[derive(Clone)]
pub struct AppState {
    pub vehicle_service: VehicleService,
    pub streaming_service: StreamingReplayService,
}
