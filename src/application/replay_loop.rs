// Replay loop - Reveals one vehicle's history as if it were arriving live
use crate::application::aggregator::IncrementalAggregator;
use crate::application::render_sink::{RenderError, RenderSink};
use crate::application::series_filter::{ReplaySequence, filter_series};
use crate::application::telemetry_repository::{
    DataUnavailable, TelemetryConnection, TelemetryRepository,
};
use crate::application::trail_window::TrailWindow;
use crate::domain::dashboard::Notice;
use crate::domain::record::{Record, TimeRange};
use crate::domain::telemetry::{
    ChartData, ChartKind, KpiTile, SeriesData, TimeSeriesPoint, TrailData,
};
use crate::infrastructure::config::DashboardConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    DataUnavailable(#[from] DataUnavailable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// One record was revealed and rendered.
    Revealed,
    /// The sequence is exhausted; the final frame has been rendered.
    Finished,
    /// No session is running.
    Idle,
    /// The sink went away; the session should end.
    Detached,
}

struct Session {
    sequence: ReplaySequence,
    cursor: usize,
    /// Held for the lifetime of the session, released on finish or reset.
    connection: Option<Box<dyn TelemetryConnection>>,
    history: Vec<Record>,
    started: Instant,
}

pub struct ReplayLoop<S> {
    repository: Arc<dyn TelemetryRepository>,
    sink: S,
    dashboard: DashboardConfig,
    window: TimeRange,
    tick_interval: Duration,
    state: ReplayState,
    aggregator: IncrementalAggregator,
    trail: TrailWindow,
    charts: Vec<ChartData>,
    session: Option<Session>,
    detached: bool,
}

impl<S: RenderSink> ReplayLoop<S> {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        sink: S,
        dashboard: DashboardConfig,
        window: TimeRange,
    ) -> Self {
        let aggregator = IncrementalAggregator::new(dashboard.kpis.iter().map(|k| k.field.clone()));
        let trail = TrailWindow::new(dashboard.trail.capacity);
        let charts = empty_charts(&dashboard);
        let tick_interval = dashboard.tick_interval();

        Self {
            repository,
            sink,
            dashboard,
            window,
            tick_interval,
            state: ReplayState::Idle,
            aggregator,
            trail,
            charts,
            session: None,
            detached: false,
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn aggregator(&self) -> &IncrementalAggregator {
        &self.aggregator
    }

    pub fn trail(&self) -> &TrailWindow {
        &self.trail
    }

    pub fn charts(&self) -> &[ChartData] {
        &self.charts
    }

    /// Records revealed so far in the current session, in replay order.
    pub fn revealed(&self) -> &[Record] {
        self.session
            .as_ref()
            .map(|s| s.history.as_slice())
            .unwrap_or_default()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.sequence.entity_id())
    }

    /// Fetch the window, narrow it to `entity_id` and begin a session.
    ///
    /// An empty sequence renders the empty state once and finishes
    /// immediately. A data source failure renders the unavailable notice
    /// and leaves the loop idle.
    pub async fn start(&mut self, entity_id: &str) -> Result<(), ReplayError> {
        if self.state != ReplayState::Idle {
            self.reset();
        }

        tracing::info!(entity_id, "starting replay");
        let repository = self.repository.clone();
        let (connection, sequence) =
            match fetch_sequence(repository.as_ref(), &self.window, entity_id).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    tracing::warn!(entity_id, "replay not started: {}", err);
                    let notice = Notice::Unavailable {
                        reason: err.reason.clone(),
                    };
                    let result = self.sink.render_notice(&notice).await;
                    self.detached |= !delivered("notice", result);
                    return Err(err.into());
                }
            };

        tracing::debug!(
            entity_id,
            records = sequence.len(),
            missing_entity = sequence.missing_entity(),
            "replay sequence ready"
        );
        let result = self.sink.render_table(entity_id, sequence.records()).await;
        self.detached |= !delivered("table", result);

        let empty = sequence.is_empty();
        self.session = Some(Session {
            sequence,
            cursor: 0,
            connection: Some(connection),
            history: Vec::new(),
            started: Instant::now(),
        });
        self.state = ReplayState::Running;

        if empty {
            tracing::info!(entity_id, "no records to replay");
            self.render_frame().await;
            let notice = Notice::Empty {
                entity_id: entity_id.to_string(),
            };
            let result = self.sink.render_notice(&notice).await;
            self.detached |= !delivered("notice", result);
            self.finish();
        }

        Ok(())
    }

    /// Drop the current session, if any, and return to `Idle`.
    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(
                entity_id = session.sequence.entity_id(),
                revealed = session.history.len(),
                "replay session discarded"
            );
        }
        self.aggregator.reset();
        self.trail.clear();
        self.charts = empty_charts(&self.dashboard);
        self.state = ReplayState::Idle;
    }

    /// Abort whatever is running and start over with another vehicle.
    pub async fn reselect(&mut self, entity_id: &str) -> Result<(), ReplayError> {
        self.reset();
        self.start(entity_id).await
    }

    /// Reveal the next well-formed record, or render the final frame when
    /// none are left.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.detached {
            return TickOutcome::Detached;
        }
        match self.state {
            ReplayState::Idle => return TickOutcome::Idle,
            ReplayState::Finished => return TickOutcome::Finished,
            ReplayState::Running => {}
        }
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Idle;
        };

        let next = loop {
            let Some(raw) = session.sequence.get(session.cursor) else {
                break None;
            };
            session.cursor += 1;
            match Record::try_from(raw) {
                Ok(record) => break Some(record),
                Err(err) => tracing::warn!(
                    entity_id = session.sequence.entity_id(),
                    position = session.cursor - 1,
                    "skipping malformed record: {}",
                    err
                ),
            }
        };

        let Some(record) = next else {
            self.render_frame().await;
            self.complete().await;
            return if self.detached {
                TickOutcome::Detached
            } else {
                TickOutcome::Finished
            };
        };

        self.aggregator.observe(&record);
        self.trail.push(record.latitude, record.longitude);
        let time_ms = record.timestamp.timestamp_millis();
        for series in self.charts.iter_mut().flat_map(|c| c.series.iter_mut()) {
            if let Some(value) = record.sensor(&series.field) {
                series.points.push(TimeSeriesPoint::new(time_ms, value));
            }
        }
        tracing::debug!(
            entity_id = %record.entity_id,
            timestamp = %record.timestamp,
            revealed = session.history.len() + 1,
            "revealed record"
        );
        session.history.push(record);

        self.render_frame().await;
        if self.detached {
            TickOutcome::Detached
        } else {
            TickOutcome::Revealed
        }
    }

    /// Replay `entity_id` from the start until it finishes or the sink
    /// detaches. Returns the number of records revealed.
    pub async fn run_to_completion(&mut self, entity_id: &str) -> Result<usize, ReplayError> {
        self.reselect(entity_id).await?;
        loop {
            match self.tick().await {
                TickOutcome::Revealed => tokio::time::sleep(self.tick_interval).await,
                TickOutcome::Finished | TickOutcome::Idle | TickOutcome::Detached => break,
            }
        }
        let revealed = self.revealed().len();
        self.end();
        Ok(revealed)
    }

    /// Follow `selection` until it closes or the sink detaches. Every change
    /// of the selected vehicle restarts the replay; a change is observed at
    /// the latest by the next tick.
    pub async fn drive(&mut self, selection: &mut watch::Receiver<Option<String>>) {
        loop {
            let selected = selection.borrow_and_update().clone();
            match selected {
                Some(entity_id) => {
                    // Failure has already been rendered; wait for a new selection
                    let _ = self.reselect(&entity_id).await;
                }
                None => self.reset(),
            }
            if !self.play(selection).await {
                break;
            }
        }
        self.end();
    }

    /// Tick the running session and wait for the next selection change.
    /// Returns false when the session should end.
    async fn play(&mut self, selection: &mut watch::Receiver<Option<String>>) -> bool {
        while self.state == ReplayState::Running {
            if self.tick().await == TickOutcome::Detached {
                return false;
            }
            if self.state != ReplayState::Running {
                break;
            }
            tokio::select! {
                biased;
                changed = selection.changed() => return changed.is_ok(),
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }
        if self.detached {
            return false;
        }
        selection.changed().await.is_ok()
    }

    fn end(&mut self) {
        if let Some(entity_id) = self.entity_id() {
            tracing::info!(entity_id, "replay session ended");
        }
        self.reset();
    }

    /// Send the closing notice. A sequence whose rows were all malformed ends
    /// in the empty state, the same as one with no rows at all.
    async fn complete(&mut self) {
        let notice = match self.session.as_ref() {
            Some(session) if session.history.is_empty() => {
                let entity_id = session.sequence.entity_id();
                tracing::info!(entity_id, "no well-formed records to replay");
                Notice::Empty {
                    entity_id: entity_id.to_string(),
                }
            }
            Some(session) => {
                let entity_id = session.sequence.entity_id();
                let ticks = session.history.len();
                tracing::info!(entity_id, ticks, "replay finished");
                Notice::Complete {
                    entity_id: entity_id.to_string(),
                    ticks,
                    duration_ms: session.started.elapsed().as_millis() as i64,
                }
            }
            None => return,
        };
        let result = self.sink.render_notice(&notice).await;
        self.detached |= !delivered("notice", result);
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.connection = None;
        }
        self.state = ReplayState::Finished;
    }

    /// Push KPIs, every chart and the trail to the sink.
    async fn render_frame(&mut self) {
        let tiles = self.kpi_tiles();
        let mut detached = !delivered("kpis", self.sink.render_kpis(&tiles).await);

        for chart in &self.charts {
            detached |= !delivered("chart", self.sink.render_chart(chart).await);
        }

        let trail = TrailData::new(self.trail.snapshot(), self.dashboard.trail.min_points());
        detached |= !delivered("trail", self.sink.render_trail(&trail).await);

        self.detached |= detached;
    }

    fn kpi_tiles(&self) -> Vec<KpiTile> {
        let means: HashMap<String, Option<i64>> = self.aggregator.snapshot().into_iter().collect();
        self.dashboard
            .kpis
            .iter()
            .map(|kpi| {
                KpiTile::new(
                    kpi.id.clone(),
                    kpi.title.clone(),
                    kpi.unit.clone(),
                    means.get(&kpi.field).copied().flatten(),
                )
            })
            .collect()
    }
}

async fn fetch_sequence(
    repository: &dyn TelemetryRepository,
    window: &TimeRange,
    entity_id: &str,
) -> Result<(Box<dyn TelemetryConnection>, ReplaySequence), DataUnavailable> {
    let mut connection = repository.connect().await?;
    let records = connection.records_between(window).await?;
    Ok((connection, filter_series(records, entity_id)))
}

fn empty_charts(dashboard: &DashboardConfig) -> Vec<ChartData> {
    dashboard
        .charts
        .iter()
        .map(|c| ChartData {
            id: c.id.clone(),
            title: c.title.clone(),
            unit: c.unit.clone(),
            // Kinds are checked when the config is loaded
            kind: ChartKind::from_name(&c.kind).unwrap_or(ChartKind::Line),
            y_min: c.y_min,
            y_max: c.y_max,
            series: c
                .series
                .iter()
                .map(|s| SeriesData::new(s.id.clone(), s.name.clone(), s.color.clone(), s.field.clone()))
                .collect(),
        })
        .collect()
}

/// Log a failed render. Returns false when the sink has detached.
fn delivered(panel: &str, result: Result<(), RenderError>) -> bool {
    match result {
        Ok(()) => true,
        Err(RenderError::Rejected(reason)) => {
            tracing::warn!(panel, "render failed: {}", reason);
            true
        }
        Err(RenderError::Detached) => false,
    }
}
