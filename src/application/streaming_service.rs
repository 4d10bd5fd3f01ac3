// Streaming replay service - Runs replay loops that push frames to clients
use crate::application::replay_loop::ReplayLoop;
use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::record::TimeRange;
use crate::infrastructure::channel_sink::ChannelSink;
use crate::infrastructure::config::DashboardConfig;
use crate::infrastructure::stream_message::StreamMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct StreamingReplayService {
    repository: Arc<dyn TelemetryRepository>,
    dashboard: DashboardConfig,
    window: TimeRange,
}

impl StreamingReplayService {
    pub fn new(
        repository: Arc<dyn TelemetryRepository>,
        dashboard: DashboardConfig,
        window: TimeRange,
    ) -> Self {
        Self {
            repository,
            dashboard,
            window,
        }
    }

    fn replay_loop(&self, tx: mpsc::Sender<StreamMessage>) -> ReplayLoop<ChannelSink> {
        ReplayLoop::new(
            self.repository.clone(),
            ChannelSink::new(tx),
            self.dashboard.clone(),
            self.window,
        )
    }

    /// Replay one vehicle to the end. The receiver closes when the replay
    /// finishes, fails to start, or is dropped by the client.
    pub fn stream_replay(
        &self,
        entity_id: &str,
        tick_interval: Option<Duration>,
    ) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut replay = self.replay_loop(tx);
        if let Some(interval) = tick_interval {
            replay = replay.with_tick_interval(interval);
        }
        let entity_id = entity_id.to_string();

        tokio::spawn(async move {
            match replay.run_to_completion(&entity_id).await {
                Ok(revealed) => tracing::debug!(%entity_id, revealed, "replay stream closed"),
                Err(err) => tracing::debug!(%entity_id, "replay stream aborted: {}", err),
            }
        });

        rx
    }

    /// Follow a client-controlled selection. The session ends when the
    /// selection sender or the receiver is dropped.
    pub fn live_session(
        &self,
        mut selection: watch::Receiver<Option<String>>,
    ) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut replay = self.replay_loop(tx);

        tokio::spawn(async move {
            replay.drive(&mut selection).await;
            tracing::debug!("live session closed");
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{MemoryRepository, reading, test_dashboard, test_window};
    use crate::domain::dashboard::Notice;

    fn service(repo: &MemoryRepository) -> StreamingReplayService {
        StreamingReplayService::new(Arc::new(repo.clone()), test_dashboard(), test_window())
    }

    async fn drain(mut rx: mpsc::Receiver<StreamMessage>) -> Vec<StreamMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = rx.recv().await {
            messages.push(msg);
        }
        messages
    }

    #[tokio::test]
    async fn test_stream_replay_emits_frames_then_closes() {
        let repo = MemoryRepository::new(vec![
            reading("101", 1, Some(10.0), Some((1.0, 1.0))),
            reading("101", 2, Some(20.0), Some((2.0, 2.0))),
        ]);

        let messages = drain(service(&repo).stream_replay("101", None)).await;

        let kinds: Vec<&str> = messages.iter().map(StreamMessage::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "table", "kpis", "chart", "trail", "kpis", "chart", "trail", "kpis", "chart",
                "trail", "notice"
            ]
        );
        assert!(matches!(
            messages.last(),
            Some(StreamMessage::Notice {
                notice: Notice::Complete { ticks: 2, .. }
            })
        ));
        assert_eq!(repo.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_stream_of_malformed_rows_ends_empty() {
        let records = (1..=3)
            .map(|i| {
                let mut row = reading("101", i, Some(10.0), None);
                row.timestamp = None;
                row
            })
            .collect();
        let repo = MemoryRepository::new(records);

        let messages = drain(service(&repo).stream_replay("101", None)).await;

        let notices: Vec<&Notice> = messages
            .iter()
            .filter_map(|m| match m {
                StreamMessage::Notice { notice } => Some(notice),
                _ => None,
            })
            .collect();
        assert_eq!(
            notices,
            vec![&Notice::Empty {
                entity_id: "101".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_stream_replay_reports_unavailable() {
        let repo = MemoryRepository::failing_connect();

        let messages = drain(service(&repo).stream_replay("101", None)).await;

        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            StreamMessage::Notice {
                notice: Notice::Unavailable { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_live_session_follows_selection() {
        let repo = MemoryRepository::new(vec![
            reading("101", 1, Some(10.0), None),
            reading("202", 2, Some(50.0), None),
        ]);
        let (tx, selection) = watch::channel(None);
        let mut rx = service(&repo).live_session(selection);

        tx.send(Some("202".to_string())).unwrap();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamMessage::Table { ref entity_id, .. } if entity_id == "202"));

        loop {
            if let StreamMessage::Notice { .. } = rx.recv().await.unwrap() {
                break;
            }
        }

        drop(tx);
        assert!(rx.recv().await.is_none());
        assert_eq!(repo.live_connections(), 0);
    }
}
