// Output port for the replay loop
use crate::domain::dashboard::Notice;
use crate::domain::record::RawRecord;
use crate::domain::telemetry::{ChartData, KpiTile, TrailData};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The sink refused this update. Rendering is best-effort, so the replay
    /// carries on with the next tick.
    #[error("render rejected: {0}")]
    Rejected(String),
    /// Nobody is listening any more; the session should end.
    #[error("render sink detached")]
    Detached,
}

/// Each call replaces whatever the sink displayed for that panel before.
#[async_trait]
pub trait RenderSink: Send {
    async fn render_kpis(&mut self, tiles: &[KpiTile]) -> Result<(), RenderError>;

    async fn render_chart(&mut self, chart: &ChartData) -> Result<(), RenderError>;

    async fn render_trail(&mut self, trail: &TrailData) -> Result<(), RenderError>;

    async fn render_table(&mut self, entity_id: &str, rows: &[RawRecord]) -> Result<(), RenderError>;

    async fn render_notice(&mut self, notice: &Notice) -> Result<(), RenderError>;
}
