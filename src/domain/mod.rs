// Domain layer - Plain data shared by every other layer
pub mod dashboard;
pub mod record;
pub mod telemetry;
pub mod vehicle;
