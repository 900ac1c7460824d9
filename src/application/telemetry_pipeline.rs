// Telemetry pipeline - Inbound frame handling, statistics and the display flush loop
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::application::aggregator::TelemetryAggregator;
use crate::application::events::{DashboardEvent, EventBus};
use crate::domain::series::{DisplaySeries, SeriesRow};
use crate::domain::stats::RunningStats;
use crate::domain::telemetry::{TelemetrySample, ValidationError};

#[derive(Debug)]
struct PipelineState {
    aggregator: TelemetryAggregator,
    stats: RunningStats,
    alert_raised: bool,
    rejected: u64,
}

#[derive(Clone)]
pub struct TelemetryPipeline {
    state: Arc<Mutex<PipelineState>>,
    events: EventBus,
}

impl TelemetryPipeline {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(PipelineState {
                aggregator: TelemetryAggregator::new(Instant::now()),
                stats: RunningStats::default(),
                alert_raised: false,
                rejected: 0,
            })),
            events,
        }
    }

    /// Handle one raw frame from the peer. Valid samples are buffered and
    /// folded into the statistics; invalid ones are dropped and raise a single
    /// alert per run.
    pub async fn ingest(&self, raw: &str) -> Result<TelemetrySample, ValidationError> {
        let parsed = TelemetrySample::parse(raw);
        let mut state = self.state.lock().await;

        match parsed {
            Ok(sample) => {
                state.aggregator.push(sample);
                state.stats.update(&sample);
                Ok(sample)
            }
            Err(e) => {
                state.rejected += 1;
                tracing::warn!(rejected = state.rejected, "dropping telemetry frame: {}", e);
                if !state.alert_raised {
                    state.alert_raised = true;
                    self.events.publish(DashboardEvent::Alert {
                        message: format!("Fetched data in wrong format: {}", e),
                    });
                }
                Err(e)
            }
        }
    }

    pub async fn flush(&self, now: Instant) -> Option<SeriesRow> {
        let mut state = self.state.lock().await;
        let row = state.aggregator.flush(now)?;

        self.events.publish(DashboardEvent::Row { row: row.clone() });
        self.events.publish(DashboardEvent::Stats {
            stats: state.stats.clone(),
        });
        Some(row)
    }

    /// Reset statistics, series and the alert latch for a new run.
    pub async fn begin_run(&self, origin: Instant) {
        let mut state = self.state.lock().await;
        state.aggregator.restart(origin);
        state.stats.reset();
        state.alert_raised = false;
        state.rejected = 0;
    }

    pub async fn clear_series(&self) {
        self.state.lock().await.aggregator.clear_series();
    }

    pub async fn stats(&self) -> RunningStats {
        self.state.lock().await.stats.clone()
    }

    pub async fn series(&self) -> DisplaySeries {
        self.state.lock().await.aggregator.series().clone()
    }

    pub async fn rejected_frames(&self) -> u64 {
        self.state.lock().await.rejected
    }

    /// Drain the buffer into the series on a fixed period, for the service lifetime.
    pub fn spawn_flush_loop(&self, period: Duration) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let now = ticker.tick().await;
                pipeline.flush(now).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::Channel;

    const FRAME: &str = r#"{"thrust":1.0,"torque":0.5,"voltage":12.0,"current":2.0}"#;

    #[tokio::test]
    async fn test_ingest_updates_buffer_and_stats() {
        let pipeline = TelemetryPipeline::new(EventBus::new());
        pipeline.ingest(FRAME).await.unwrap();
        pipeline
            .ingest(r#"{"thrust":3.0,"torque":0.5,"voltage":11.0,"current":2.0}"#)
            .await
            .unwrap();

        let stats = pipeline.stats().await;
        assert_eq!(stats.get(Channel::Thrust).max, 3.0);
        assert_eq!(stats.get(Channel::Voltage).min, 11.0);

        let row = pipeline.flush(Instant::now()).await.unwrap();
        assert_eq!(row.values[Channel::Thrust.index()], Some(2.0));
    }

    #[tokio::test]
    async fn test_invalid_frames_alert_once() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let pipeline = TelemetryPipeline::new(events);

        let bad = r#"{"thrust":1,"torque":"x","voltage":1,"current":1}"#;
        assert!(pipeline.ingest(bad).await.is_err());
        assert!(pipeline.ingest(bad).await.is_err());
        assert_eq!(pipeline.rejected_frames().await, 2);

        assert!(matches!(rx.try_recv(), Ok(DashboardEvent::Alert { .. })));
        assert!(rx.try_recv().is_err());

        // Valid traffic keeps flowing after a rejection.
        pipeline.ingest(FRAME).await.unwrap();
        assert!(pipeline.flush(Instant::now()).await.is_some());
    }

    #[tokio::test]
    async fn test_begin_run_resets_everything() {
        let pipeline = TelemetryPipeline::new(EventBus::new());
        pipeline.ingest(FRAME).await.unwrap();
        pipeline.flush(Instant::now()).await;
        pipeline.ingest(FRAME).await.unwrap();

        pipeline.begin_run(Instant::now()).await;

        assert!(pipeline.series().await.is_empty());
        assert!(pipeline.stats().await.get(Channel::Thrust).is_unset());
        assert!(pipeline.flush(Instant::now()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_appends_rows() {
        let pipeline = TelemetryPipeline::new(EventBus::new());
        let handle = pipeline.spawn_flush_loop(Duration::from_millis(100));

        pipeline.ingest(FRAME).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        pipeline.ingest(FRAME).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // No samples in this window.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(pipeline.series().await.len(), 2);
        handle.abort();
    }
}
