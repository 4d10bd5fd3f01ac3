// Repository traits for telemetry data access
use crate::domain::record::{RawRecord, TimeRange};
use async_trait::async_trait;
use thiserror::Error;

/// Any failure to reach or query the store. Fatal to session start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("data unavailable: {reason}")]
pub struct DataUnavailable {
    pub reason: String,
}

impl DataUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<anyhow::Error> for DataUnavailable {
    fn from(err: anyhow::Error) -> Self {
        // Keep the whole context chain for the log line and the notice
        Self::new(format!("{:#}", err))
    }
}

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Acquire a connection. It is released when dropped.
    async fn connect(&self) -> Result<Box<dyn TelemetryConnection>, DataUnavailable>;
}

#[async_trait]
pub trait TelemetryConnection: Send {
    /// Rows with `range.start <= time <= range.end`, ascending by time.
    async fn records_between(&mut self, range: &TimeRange)
    -> Result<Vec<RawRecord>, DataUnavailable>;
}
