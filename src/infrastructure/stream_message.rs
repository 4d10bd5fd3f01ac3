// Wire messages pushed to dashboard clients
use crate::domain::dashboard::Notice;
use crate::domain::record::RawRecord;
use crate::domain::telemetry::{ChartData, KpiTile, TrailData};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    Table {
        entity_id: String,
        rows: Vec<RawRecord>,
    },
    Kpis {
        tiles: Vec<KpiTile>,
    },
    Chart {
        chart: ChartData,
    },
    Trail {
        trail: TrailData,
    },
    Notice {
        notice: Notice,
    },
}

impl StreamMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamMessage::Table { .. } => "table",
            StreamMessage::Kpis { .. } => "kpis",
            StreamMessage::Chart { .. } => "chart",
            StreamMessage::Trail { .. } => "trail",
            StreamMessage::Notice { .. } => "notice",
        }
    }
}
