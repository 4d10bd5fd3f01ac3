// JSON file repository for offline replays
use crate::application::telemetry_repository::{
    DataUnavailable, TelemetryConnection, TelemetryRepository,
};
use crate::domain::record::{RawRecord, TimeRange};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads a JSON array of records. The file must already be sorted by time.
#[derive(Debug, Clone)]
pub struct FileRepository {
    path: PathBuf,
}

pub struct FileConnection {
    records: Vec<RawRecord>,
}

impl FileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TelemetryRepository for FileRepository {
    async fn connect(&self) -> Result<Box<dyn TelemetryConnection>, DataUnavailable> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let records: Vec<RawRecord> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        tracing::debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(Box::new(FileConnection { records }))
    }
}

#[async_trait]
impl TelemetryConnection for FileConnection {
    async fn records_between(
        &mut self,
        range: &TimeRange,
    ) -> Result<Vec<RawRecord>, DataUnavailable> {
        // Rows without a timestamp are passed on so the replay can report them
        Ok(self
            .records
            .iter()
            .filter(|r| r.timestamp.is_none_or(|t| range.contains(t)))
            .cloned()
            .collect())
    }
}
