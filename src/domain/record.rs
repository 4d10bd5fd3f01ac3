// Vehicle sensor record domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A row exactly as the data source delivered it.
///
/// `entity_id` and `timestamp` are required for replay but are kept optional
/// here so a bad row can be reported and skipped instead of failing the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub entity_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Sensor columns by name. A missing key is a null reading.
    #[serde(default)]
    pub sensors: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("record has no entity id")]
    MissingEntityId,
    #[error("record for {0} has no timestamp")]
    MissingTimestamp(String),
}

/// A validated record, ready to be revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub sensors: BTreeMap<String, f64>,
}

impl Record {
    /// Value of a sensor column; non-finite readings count as null.
    pub fn sensor(&self, field: &str) -> Option<f64> {
        self.sensors.get(field).copied().filter(|v| v.is_finite())
    }
}

impl TryFrom<&RawRecord> for Record {
    type Error = MalformedRecord;

    fn try_from(raw: &RawRecord) -> Result<Self, Self::Error> {
        let entity_id = raw
            .entity_id
            .clone()
            .ok_or(MalformedRecord::MissingEntityId)?;
        let timestamp = raw
            .timestamp
            .ok_or_else(|| MalformedRecord::MissingTimestamp(entity_id.clone()))?;

        Ok(Self {
            entity_id,
            timestamp,
            latitude: raw.latitude,
            longitude: raw.longitude,
            sensors: raw.sensors.clone(),
        })
    }
}

/// Inclusive time window handed to the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}
