// Vehicle service - Use case for listing selectable vehicles
use crate::application::telemetry_repository::{DataUnavailable, TelemetryRepository};
use crate::domain::record::TimeRange;
use crate::domain::vehicle::Vehicle;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct VehicleService {
    repository: Arc<dyn TelemetryRepository>,
    window: TimeRange,
}

impl VehicleService {
    pub fn new(repository: Arc<dyn TelemetryRepository>, window: TimeRange) -> Self {
        Self { repository, window }
    }

    /// Distinct vehicles in the window, in order of first appearance.
    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>, DataUnavailable> {
        let records = {
            let mut connection = self.repository.connect().await?;
            connection.records_between(&self.window).await?
        };

        let mut seen = HashSet::new();
        let mut vehicles = Vec::new();
        let mut missing = 0usize;
        for record in records {
            match record.entity_id {
                Some(id) => {
                    if seen.insert(id.clone()) {
                        vehicles.push(Vehicle::new(id));
                    }
                }
                None => missing += 1,
            }
        }
        if missing > 0 {
            tracing::warn!("skipped {} records without a vehicle id", missing);
        }

        Ok(vehicles)
    }
}
