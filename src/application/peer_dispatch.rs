// Peer dispatch - Routes inbound peer traffic to the pipeline and session
use tokio::sync::mpsc;

use crate::application::events::{DashboardEvent, EventBus};
use crate::application::peer_link::PeerEvent;
use crate::application::session_controller::SessionController;
use crate::application::telemetry_pipeline::TelemetryPipeline;

pub async fn run_peer_dispatch(
    mut inbound: mpsc::Receiver<PeerEvent>,
    telemetry: TelemetryPipeline,
    session: SessionController,
    events: EventBus,
) {
    // Newest connection seen; loss of any older one is stale.
    let mut latest = 0u64;
    while let Some(event) = inbound.recv().await {
        match event {
            PeerEvent::Connected { generation } => {
                if generation < latest {
                    tracing::debug!(generation, latest, "ignoring superseded connect");
                    continue;
                }
                latest = generation;
                tracing::info!(generation, "peer link up");
                events.publish(DashboardEvent::Link { connected: true });
            }
            PeerEvent::Frame(text) => {
                // Rejections are already logged and alerted by the pipeline.
                let _ = telemetry.ingest(&text).await;
            }
            PeerEvent::Lost { generation } => {
                if generation != latest {
                    tracing::debug!(generation, latest, "ignoring loss of superseded link");
                    continue;
                }
                tracing::warn!(generation, "peer link lost");
                events.publish(DashboardEvent::Link { connected: false });
                session.on_link_lost().await;
            }
        }
    }
    tracing::debug!("peer dispatch finished");
}
