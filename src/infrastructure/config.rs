use crate::domain::record::TimeRange;
use crate::domain::telemetry::ChartKind;
use anyhow::Context;
use chrono::DateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_INFLUX_QUERY: &str =
    "SELECT * FROM \"${measurement}\" WHERE time >= '${start}' AND time <= '${end}' ORDER BY time ASC";

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub source: SourceSettings,
    pub influx: Option<InfluxSettings>,
    pub file: Option<FileSettings>,
    #[serde(default = "default_window")]
    pub window: TimeRange,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Influx,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub kind: SourceKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    pub measurement: String,
    pub entity_column: String,
    #[serde(default = "default_latitude_column")]
    pub latitude_column: String,
    #[serde(default = "default_longitude_column")]
    pub longitude_column: String,
    #[serde(default = "default_influx_query")]
    pub query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileSettings {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub trail: TrailConfig,
    #[serde(default = "default_kpis")]
    pub kpis: Vec<KpiConfig>,
    #[serde(default = "default_charts")]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrailConfig {
    #[serde(default = "default_trail_capacity")]
    pub capacity: usize,
    /// Points needed before the trail is drawn. Defaults to `capacity`.
    pub min_points: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KpiConfig {
    pub id: String,
    pub title: String,
    pub unit: String,
    pub field: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub title: String,
    pub unit: Option<String>,
    pub kind: String,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeriesConfig {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub field: String,
}

impl TrailConfig {
    pub fn min_points(&self) -> usize {
        self.min_points.unwrap_or(self.capacity)
    }
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            capacity: default_trail_capacity(),
            min_points: None,
        }
    }
}

impl DashboardConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.trail.capacity == 0 {
            anyhow::bail!("trail.capacity must be at least 1");
        }
        if self.trail.min_points() == 0 {
            anyhow::bail!("trail.min_points must be at least 1");
        }
        if self.trail.min_points() > self.trail.capacity {
            anyhow::bail!(
                "trail.min_points ({}) exceeds trail.capacity ({}); the trail would never be drawn",
                self.trail.min_points(),
                self.trail.capacity
            );
        }
        for chart in &self.charts {
            if ChartKind::from_name(&chart.kind).is_none() {
                anyhow::bail!(
                    "chart {} has unknown kind {:?}; expected \"line\" or \"multiLine\"",
                    chart.id,
                    chart.kind
                );
            }
        }
        Ok(())
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            trail: TrailConfig::default(),
            kpis: default_kpis(),
            charts: default_charts(),
        }
    }
}

fn default_window() -> TimeRange {
    TimeRange {
        // 2023-01-01T00:00:00Z ..= 2023-01-30T23:59:59Z
        start: DateTime::from_timestamp(1_672_531_200, 0).unwrap_or_default(),
        end: DateTime::from_timestamp(1_675_123_199, 0).unwrap_or_default(),
    }
}

fn default_latitude_column() -> String {
    "lat".to_string()
}

fn default_longitude_column() -> String {
    "lon".to_string()
}

fn default_influx_query() -> String {
    DEFAULT_INFLUX_QUERY.to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_trail_capacity() -> usize {
    3
}

fn default_kpis() -> Vec<KpiConfig> {
    [
        ("air_temp", "Air temperature", "°C", "rs_e_inairtemp_pc1"),
        ("oil_pressure", "Oil pressure", "bar", "rs_e_oilpress_pc1"),
        ("water_temp", "Water temperature", "°C", "rs_e_wattemp_pc1"),
    ]
    .into_iter()
    .map(|(id, title, unit, field)| KpiConfig {
        id: id.to_string(),
        title: title.to_string(),
        unit: unit.to_string(),
        field: field.to_string(),
    })
    .collect()
}

fn default_charts() -> Vec<ChartConfig> {
    vec![ChartConfig {
        id: "air_temp_history".to_string(),
        title: "Air Temperature Over Time".to_string(),
        unit: Some("°C".to_string()),
        kind: "line".to_string(),
        y_min: None,
        y_max: None,
        series: vec![SeriesConfig {
            id: "air_temp".to_string(),
            name: "Air temperature".to_string(),
            color: None,
            field: "rs_e_inairtemp_pc1".to_string(),
        }],
    }]
}

fn load<T: DeserializeOwned>(name: &str) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(&format!("config/{}", name)))
        .add_source(
            config::Environment::with_prefix(&format!("FLEET_REPLAY_{}", name.to_uppercase()))
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("failed to read config/{}", name))?;

    settings
        .try_deserialize()
        .with_context(|| format!("invalid config/{}", name))
}

pub fn load_service_config() -> anyhow::Result<ServiceConfig> {
    load("service")
}

pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let dashboard: DashboardConfig = load("dashboard")?;
    dashboard.validate()?;
    Ok(dashboard)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
