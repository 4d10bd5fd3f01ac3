// Telemetry render payload models
use super::record::GeoPoint;
use serde::Serialize;

/// Shown in place of a KPI that has no readings yet.
pub const KPI_PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiTile {
    pub id: String,
    pub title: String,
    pub unit: String,
    /// Rounded running mean; `None` until the field has a reading.
    pub value: Option<i64>,
    pub display: String,
}

impl KpiTile {
    pub fn new(id: String, title: String, unit: String, value: Option<i64>) -> Self {
        let display = match value {
            Some(v) => v.to_string(),
            None => KPI_PLACEHOLDER.to_string(),
        };
        Self {
            id,
            title,
            unit,
            value,
            display,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesData {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    /// Sensor column this series plots.
    #[serde(skip)]
    pub field: String,
    pub points: Vec<TimeSeriesPoint>,
}

impl SeriesData {
    pub fn new(id: String, name: String, color: Option<String>, field: String) -> Self {
        Self {
            id,
            name,
            color,
            field,
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub id: String,
    pub title: String,
    pub unit: Option<String>,
    pub kind: ChartKind,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub series: Vec<SeriesData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Line,
    MultiLine,
}

impl ChartKind {
    /// The kind named in dashboard config, or `None` if it is not one we draw.
    pub fn from_name(kind: &str) -> Option<Self> {
        match kind {
            "line" => Some(ChartKind::Line),
            "multiLine" => Some(ChartKind::MultiLine),
            _ => None,
        }
    }
}

/// The most recent positions, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailData {
    pub points: Vec<GeoPoint>,
    pub min_points: usize,
    pub drawable: bool,
}

impl TrailData {
    pub fn new(points: Vec<GeoPoint>, min_points: usize) -> Self {
        let drawable = points.len() >= min_points;
        Self {
            points,
            min_points,
            drawable,
        }
    }
}
