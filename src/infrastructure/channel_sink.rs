// Render sink that forwards frames over an mpsc channel
use crate::application::render_sink::{RenderError, RenderSink};
use crate::domain::dashboard::Notice;
use crate::domain::record::RawRecord;
use crate::domain::telemetry::{ChartData, KpiTile, TrailData};
use crate::infrastructure::stream_message::StreamMessage;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Per-tick frames are dropped when the client falls behind; tables and
/// notices always wait for room. The latest dropped frame of each panel is
/// held back and delivered before the next notice, so a client that catches
/// up sees the final state ahead of the closing notice.
pub struct ChannelSink {
    tx: mpsc::Sender<StreamMessage>,
    held: Vec<(String, StreamMessage)>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StreamMessage>) -> Self {
        Self {
            tx,
            held: Vec::new(),
        }
    }

    fn push_frame(&mut self, panel: &str, msg: StreamMessage) -> Result<(), RenderError> {
        match self.tx.try_send(msg) {
            Ok(()) => {
                self.held.retain(|(held, _)| held.as_str() != panel);
                Ok(())
            }
            Err(TrySendError::Full(msg)) => {
                let kind = msg.kind();
                match self.held.iter_mut().find(|(held, _)| held.as_str() == panel) {
                    Some(slot) => slot.1 = msg,
                    None => self.held.push((panel.to_string(), msg)),
                }
                Err(RenderError::Rejected(format!(
                    "client is behind, held back {} frame",
                    kind
                )))
            }
            Err(TrySendError::Closed(_)) => Err(RenderError::Detached),
        }
    }

    async fn push(&self, msg: StreamMessage) -> Result<(), RenderError> {
        self.tx.send(msg).await.map_err(|_| RenderError::Detached)
    }

    async fn flush_held(&mut self) -> Result<(), RenderError> {
        for (_, msg) in std::mem::take(&mut self.held) {
            self.push(msg).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RenderSink for ChannelSink {
    async fn render_kpis(&mut self, tiles: &[KpiTile]) -> Result<(), RenderError> {
        self.push_frame(
            "kpis",
            StreamMessage::Kpis {
                tiles: tiles.to_vec(),
            },
        )
    }

    async fn render_chart(&mut self, chart: &ChartData) -> Result<(), RenderError> {
        self.push_frame(
            &format!("chart:{}", chart.id),
            StreamMessage::Chart {
                chart: chart.clone(),
            },
        )
    }

    async fn render_trail(&mut self, trail: &TrailData) -> Result<(), RenderError> {
        self.push_frame(
            "trail",
            StreamMessage::Trail {
                trail: trail.clone(),
            },
        )
    }

    async fn render_table(&mut self, entity_id: &str, rows: &[RawRecord]) -> Result<(), RenderError> {
        // A table opens a new session; frames of the previous one are stale
        self.held.clear();
        self.push(StreamMessage::Table {
            entity_id: entity_id.to_string(),
            rows: rows.to_vec(),
        })
        .await
    }

    async fn render_notice(&mut self, notice: &Notice) -> Result<(), RenderError> {
        self.flush_held().await?;
        self.push(StreamMessage::Notice {
            notice: notice.clone(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> KpiTile {
        KpiTile::new("air".into(), "Air".into(), "°C".into(), Some(12))
    }

    #[tokio::test]
    async fn test_full_channel_rejects_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);

        assert_eq!(sink.render_kpis(&[tile()]).await, Ok(()));
        assert!(matches!(
            sink.render_kpis(&[tile()]).await,
            Err(RenderError::Rejected(_))
        ));

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.kind(), "kpis");
    }

    fn kpi_value(msg: &StreamMessage) -> Option<i64> {
        match msg {
            StreamMessage::Kpis { tiles } => tiles[0].value,
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_final_frame_reaches_stalled_client_before_notice() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);
        let kpis = |v| [KpiTile::new("air".into(), "Air".into(), "°C".into(), Some(v))];

        assert_eq!(sink.render_kpis(&kpis(1)).await, Ok(()));
        // The client is not reading; later frames are held back
        assert!(sink.render_kpis(&kpis(2)).await.is_err());
        assert!(sink.render_kpis(&kpis(3)).await.is_err());

        let client = tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(msg) = rx.recv().await {
                received.push(msg);
            }
            received
        });
        let notice = Notice::Complete {
            entity_id: "101".to_string(),
            ticks: 3,
            duration_ms: 0,
        };
        assert_eq!(sink.render_notice(&notice).await, Ok(()));
        drop(sink);

        let received = client.await.unwrap();
        let kinds: Vec<&str> = received.iter().map(StreamMessage::kind).collect();
        assert_eq!(kinds, vec!["kpis", "kpis", "notice"]);
        assert_eq!(kpi_value(&received[0]), Some(1));
        assert_eq!(kpi_value(&received[1]), Some(3));
    }

    #[tokio::test]
    async fn test_new_table_discards_held_frames() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut sink = ChannelSink::new(tx);

        assert_eq!(sink.render_kpis(&[tile()]).await, Ok(()));
        assert!(sink.render_kpis(&[tile()]).await.is_err());
        rx.recv().await.unwrap();

        assert_eq!(sink.render_table("202", &[]).await, Ok(()));
        rx.recv().await.unwrap();
        let notice = Notice::Empty {
            entity_id: "202".to_string(),
        };
        assert_eq!(sink.render_notice(&notice).await, Ok(()));

        assert_eq!(rx.recv().await.unwrap().kind(), "notice");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_channel_detaches() {
        let (tx, rx) = mpsc::channel(4);
        let mut sink = ChannelSink::new(tx);
        drop(rx);

        assert_eq!(sink.render_kpis(&[tile()]).await, Err(RenderError::Detached));
        let notice = Notice::Unavailable {
            reason: "down".to_string(),
        };
        assert_eq!(sink.render_notice(&notice).await, Err(RenderError::Detached));
    }
}
