// Test doubles for the application layer
use crate::application::render_sink::{RenderError, RenderSink};
use crate::application::telemetry_repository::{
    DataUnavailable, TelemetryConnection, TelemetryRepository,
};
use crate::domain::dashboard::Notice;
use crate::domain::record::{RawRecord, TimeRange};
use crate::domain::telemetry::{ChartData, KpiTile, TrailData};
use crate::infrastructure::config::{
    ChartConfig, DashboardConfig, KpiConfig, SeriesConfig, TrailConfig,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A record for `entity` at `secs` past the epoch with an "air" reading.
pub fn reading(entity: &str, secs: i64, air: Option<f64>, pos: Option<(f64, f64)>) -> RawRecord {
    let mut record = RawRecord {
        entity_id: Some(entity.to_string()),
        timestamp: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        latitude: pos.map(|p| p.0),
        longitude: pos.map(|p| p.1),
        ..Default::default()
    };
    if let Some(v) = air {
        record.sensors.insert("air".to_string(), v);
    }
    record
}

pub fn test_window() -> TimeRange {
    TimeRange {
        start: Utc.timestamp_opt(0, 0).unwrap(),
        end: Utc.timestamp_opt(10_000, 0).unwrap(),
    }
}

pub fn test_dashboard() -> DashboardConfig {
    DashboardConfig {
        tick_interval_ms: 0,
        trail: TrailConfig::default(),
        kpis: vec![KpiConfig {
            id: "air_temp".to_string(),
            title: "Air temperature".to_string(),
            unit: "°C".to_string(),
            field: "air".to_string(),
        }],
        charts: vec![ChartConfig {
            id: "air_history".to_string(),
            title: "Air temperature".to_string(),
            unit: None,
            kind: "line".to_string(),
            y_min: None,
            y_max: None,
            series: vec![SeriesConfig {
                id: "air".to_string(),
                name: "Air".to_string(),
                color: None,
                field: "air".to_string(),
            }],
        }],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    Connect,
    Query,
}

#[derive(Clone)]
pub struct MemoryRepository {
    records: Vec<RawRecord>,
    failure: Failure,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            failure: Failure::None,
            opened: Arc::default(),
            live: Arc::default(),
        }
    }

    pub fn failing_connect() -> Self {
        Self {
            failure: Failure::Connect,
            ..Self::new(Vec::new())
        }
    }

    pub fn failing_query() -> Self {
        Self {
            failure: Failure::Query,
            ..Self::new(Vec::new())
        }
    }

    pub fn opened_connections(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryRepository for MemoryRepository {
    async fn connect(&self) -> Result<Box<dyn TelemetryConnection>, DataUnavailable> {
        if self.failure == Failure::Connect {
            return Err(DataUnavailable::new("connection refused"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            records: self.records.clone(),
            fail: self.failure == Failure::Query,
            live: self.live.clone(),
        }))
    }
}

struct MemoryConnection {
    records: Vec<RawRecord>,
    fail: bool,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl TelemetryConnection for MemoryConnection {
    async fn records_between(
        &mut self,
        range: &TimeRange,
    ) -> Result<Vec<RawRecord>, DataUnavailable> {
        if self.fail {
            return Err(DataUnavailable::new("query timed out"));
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.timestamp.is_none_or(|t| range.contains(t)))
            .cloned()
            .collect())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Kpis(Vec<KpiTile>),
    Chart(ChartData),
    Trail(TrailData),
    Table(String, usize),
    Notice(Notice),
}

/// Records every successful render call.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
    pub reject: bool,
    pub detach_after: Option<usize>,
}

impl RecordingSink {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Default::default()
        }
    }

    pub fn detaching_after(calls: usize) -> Self {
        Self {
            detach_after: Some(calls),
            ..Default::default()
        }
    }

    fn record(&mut self, event: SinkEvent) -> Result<(), RenderError> {
        if self.detach_after.is_some_and(|n| self.events.len() >= n) {
            return Err(RenderError::Detached);
        }
        if self.reject {
            return Err(RenderError::Rejected("sink busy".to_string()));
        }
        self.events.push(event);
        Ok(())
    }
}

#[async_trait]
impl RenderSink for RecordingSink {
    async fn render_kpis(&mut self, tiles: &[KpiTile]) -> Result<(), RenderError> {
        self.record(SinkEvent::Kpis(tiles.to_vec()))
    }

    async fn render_chart(&mut self, chart: &ChartData) -> Result<(), RenderError> {
        self.record(SinkEvent::Chart(chart.clone()))
    }

    async fn render_trail(&mut self, trail: &TrailData) -> Result<(), RenderError> {
        self.record(SinkEvent::Trail(trail.clone()))
    }

    async fn render_table(&mut self, entity_id: &str, rows: &[RawRecord]) -> Result<(), RenderError> {
        self.record(SinkEvent::Table(entity_id.to_string(), rows.len()))
    }

    async fn render_notice(&mut self, notice: &Notice) -> Result<(), RenderError> {
        self.record(SinkEvent::Notice(notice.clone()))
    }
}
