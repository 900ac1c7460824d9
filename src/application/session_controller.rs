// Session controller - Test run state machine and the setpoint loop
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::application::events::{DashboardEvent, EventBus};
use crate::application::peer_link::PeerLink;
use crate::application::telemetry_pipeline::TelemetryPipeline;
use crate::domain::ramp::{RampError, RampPoint, RampProfile, RampSettings};
use crate::domain::series::format_clock_label;
use crate::domain::session::{
    format_time_remaining, ControlMessage, RunOutcome, SessionPhase, SessionSnapshot,
    StartOutcome,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the ramp profile cannot change while a run is in progress")]
    ProfileFrozen,
    #[error(transparent)]
    Ramp(#[from] RampError),
}

#[derive(Debug, PartialEq)]
enum Tick {
    Continue,
    Finished,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    started_at: Option<Instant>,
    settings: Option<RampSettings>,
    duration_ms: u64,
    profile: RampProfile,
    current_setpoint: Option<f64>,
    last_outcome: Option<RunOutcome>,
    // Bumped per run so a tick from an earlier run never acts on a later one.
    run_id: u64,
    ticker: Option<JoinHandle<()>>,
}

/// Owns the run lifecycle. One instance per service; clones share state.
#[derive(Clone)]
pub struct SessionController {
    link: Arc<dyn PeerLink>,
    telemetry: TelemetryPipeline,
    events: EventBus,
    setpoint_interval: Duration,
    state: Arc<Mutex<SessionState>>,
}

impl SessionController {
    pub fn new(
        link: Arc<dyn PeerLink>,
        telemetry: TelemetryPipeline,
        events: EventBus,
        setpoint_interval: Duration,
    ) -> Self {
        Self {
            link,
            telemetry,
            events,
            setpoint_interval,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    /// Regenerate the profile from operator settings. An empty result means
    /// "not ready" and is stored as such.
    pub async fn configure(&self, settings: RampSettings) -> Result<RampProfile, SessionError> {
        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Running {
            return Err(SessionError::ProfileFrozen);
        }

        let profile = settings.generate();
        tracing::info!(
            points = profile.len(),
            start = settings.start_value,
            end = settings.end_value,
            duration_s = settings.duration_seconds,
            curvature = settings.curvature,
            "ramp profile configured"
        );

        state.settings = Some(settings);
        state.duration_ms = settings.duration_ms();
        state.profile = profile.clone();
        Ok(profile)
    }

    /// Manual drag-edit of a single profile point.
    pub async fn edit_point(&self, index: usize, value: f64) -> Result<RampPoint, SessionError> {
        let mut state = self.state.lock().await;
        if state.phase == SessionPhase::Running {
            return Err(SessionError::ProfileFrozen);
        }
        state.profile.set_setpoint(index, value)?;
        Ok(state.profile.points()[index])
    }

    pub async fn profile(&self) -> RampProfile {
        self.state.lock().await.profile.clone()
    }

    pub async fn settings(&self) -> Option<RampSettings> {
        self.state.lock().await.settings
    }

    pub async fn start(&self) -> StartOutcome {
        let mut state = self.state.lock().await;

        if state.phase == SessionPhase::Running {
            tracing::debug!("start ignored: a run is already in progress");
            return StartOutcome::AlreadyRunning;
        }
        let Some(initial) = state.profile.first_setpoint() else {
            return StartOutcome::NotReady;
        };
        if state.duration_ms == 0 {
            return StartOutcome::NotReady;
        }
        if !self.link.is_connected() {
            tracing::warn!("start ignored: peer link is not connected");
            return StartOutcome::Disconnected;
        }

        let start = ControlMessage::Start {
            duration: state.duration_ms,
            speed: initial,
        };
        if let Err(e) = self.link.send(start).await {
            tracing::warn!("start ignored: {}", e);
            return StartOutcome::Disconnected;
        }

        let now = Instant::now();
        self.telemetry.begin_run(now).await;

        state.phase = SessionPhase::Running;
        state.started_at = Some(now);
        state.current_setpoint = Some(initial);
        state.last_outcome = None;
        state.run_id += 1;
        state.ticker = Some(self.spawn_ticker(state.run_id, now));

        tracing::info!(
            duration_ms = state.duration_ms,
            initial_setpoint = initial,
            "test run started"
        );
        self.events.publish(DashboardEvent::Phase {
            phase: SessionPhase::Running,
            outcome: None,
        });
        self.events.publish(DashboardEvent::Setpoint { speed: initial });

        StartOutcome::Started
    }

    /// Idempotent; valid from either phase.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.halt(&mut state, RunOutcome::Stopped, true).await;
    }

    /// Abort the run after the channel dropped. Sends go nowhere once the link
    /// is gone, so the run is torn down rather than left emitting.
    pub async fn on_link_lost(&self) {
        let mut state = self.state.lock().await;
        if state.phase != SessionPhase::Running {
            return;
        }
        self.halt(&mut state, RunOutcome::LinkLost, true).await;
        self.events.publish(DashboardEvent::Alert {
            message: "Connection to the rig was lost; the test run was aborted".to_string(),
        });
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let elapsed_ms = state
            .started_at
            .map(|at| Instant::now().saturating_duration_since(at).as_millis() as u64);

        SessionSnapshot {
            phase: state.phase,
            duration_ms: state.duration_ms,
            elapsed_ms,
            elapsed_label: elapsed_ms.map(|ms| format_clock_label(ms / 1000)),
            time_remaining: format_time_remaining(state.duration_ms, elapsed_ms.unwrap_or(0)),
            current_setpoint: state.current_setpoint,
            profile_points: state.profile.len(),
            last_outcome: state.last_outcome,
        }
    }

    /// Cancel the setpoint loop and close the channel.
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock().await;
            if let Some(ticker) = state.ticker.take() {
                ticker.abort();
            }
            state.phase = SessionPhase::Idle;
            state.started_at = None;
        }
        self.link.close().await;
    }

    fn spawn_ticker(&self, run_id: u64, started_at: Instant) -> JoinHandle<()> {
        let controller = self.clone();
        let period = self.setpoint_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started_at + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if controller.tick(run_id).await == Tick::Finished {
                    break;
                }
            }
        })
    }

    async fn tick(&self, run_id: u64) -> Tick {
        let mut state = self.state.lock().await;
        if state.run_id != run_id || state.phase != SessionPhase::Running {
            return Tick::Finished;
        }
        let Some(started_at) = state.started_at else {
            return Tick::Finished;
        };

        let elapsed_ms = Instant::now().saturating_duration_since(started_at).as_millis() as u64;
        if elapsed_ms >= state.duration_ms {
            if let Some(last) = state.profile.last_setpoint() {
                self.send_setpoint(&mut state, last).await;
            }
            // Called from inside the loop: the handle is released, not aborted.
            self.halt(&mut state, RunOutcome::Completed, false).await;
            return Tick::Finished;
        }

        if let Some(speed) = state.profile.setpoint_at(elapsed_ms, state.duration_ms) {
            self.send_setpoint(&mut state, speed).await;
        }
        Tick::Continue
    }

    async fn send_setpoint(&self, state: &mut MutexGuard<'_, SessionState>, speed: f64) {
        if let Err(e) = self.link.send(ControlMessage::SpeedUpdate { speed }).await {
            tracing::warn!(speed, "setpoint not delivered: {}", e);
        }
        state.current_setpoint = Some(speed);
        self.events.publish(DashboardEvent::Setpoint { speed });
    }

    async fn halt(
        &self,
        state: &mut MutexGuard<'_, SessionState>,
        outcome: RunOutcome,
        abort_ticker: bool,
    ) {
        if self.link.is_connected() {
            if let Err(e) = self.link.send(ControlMessage::Stop).await {
                tracing::warn!("stop not delivered: {}", e);
            }
        }

        if let Some(ticker) = state.ticker.take() {
            if abort_ticker {
                ticker.abort();
            }
        }

        let was_running = state.phase == SessionPhase::Running;
        state.phase = SessionPhase::Idle;
        state.started_at = None;
        state.current_setpoint = None;

        if was_running {
            state.last_outcome = Some(outcome);
            tracing::info!(?outcome, "test run ended");
            self.events.publish(DashboardEvent::Phase {
                phase: SessionPhase::Idle,
                outcome: Some(outcome),
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::peer_link::LinkError;
    use crate::domain::stats::RunningStats;
    use crate::domain::telemetry::Channel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub(crate) struct RecordingLink {
        pub connected: AtomicBool,
        pub sent: std::sync::Mutex<Vec<ControlMessage>>,
    }

    impl RecordingLink {
        pub fn connected() -> Arc<Self> {
            let link = Self::default();
            link.connected.store(true, Ordering::SeqCst);
            Arc::new(link)
        }

        pub fn sent(&self) -> Vec<ControlMessage> {
            self.sent.lock().unwrap().clone()
        }

        fn speed_updates(&self) -> Vec<f64> {
            self.sent()
                .into_iter()
                .filter_map(|m| match m {
                    ControlMessage::SpeedUpdate { speed } => Some(speed),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl PeerLink for RecordingLink {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn send(&self, message: ControlMessage) -> Result<(), LinkError> {
            if !self.is_connected() {
                return Err(LinkError::NotConnected);
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn close(&self) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn settings(start: f64, end: f64, secs: f64) -> RampSettings {
        RampSettings {
            start_value: start,
            end_value: end,
            duration_seconds: secs,
            curvature: 0.0,
        }
    }

    fn controller(link: Arc<RecordingLink>) -> (SessionController, TelemetryPipeline) {
        let events = EventBus::new();
        let telemetry = TelemetryPipeline::new(events.clone());
        let controller = SessionController::new(
            link,
            telemetry.clone(),
            events,
            Duration::from_millis(100),
        );
        (controller, telemetry)
    }

    #[tokio::test]
    async fn test_start_requires_profile() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());

        assert_eq!(controller.start().await, StartOutcome::NotReady);

        controller.configure(settings(0.0, 1400.0, 5.0)).await.unwrap();
        assert_eq!(controller.start().await, StartOutcome::NotReady);
        assert!(link.sent().is_empty());
        assert_eq!(controller.snapshot().await.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_start_while_disconnected_is_noop() {
        let link = Arc::new(RecordingLink::default());
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();

        assert_eq!(controller.start().await, StartOutcome::Disconnected);
        assert_eq!(controller.snapshot().await.phase, SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_ramps_and_stops() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();

        assert_eq!(controller.start().await, StartOutcome::Started);
        assert_eq!(
            link.sent()[0],
            ControlMessage::Start {
                duration: 5000,
                speed: 1200.0
            }
        );

        tokio::time::sleep(Duration::from_millis(2550)).await;
        let mid = *link.speed_updates().last().unwrap();
        assert!((mid - 1300.0).abs() <= 4.0 + 1e-9, "mid-run setpoint {}", mid);
        assert_eq!(controller.snapshot().await.phase, SessionPhase::Running);

        tokio::time::sleep(Duration::from_millis(2650)).await;
        let sent = link.sent();
        let n = sent.len();
        assert_eq!(sent[n - 2], ControlMessage::SpeedUpdate { speed: 1400.0 });
        assert_eq!(sent[n - 1], ControlMessage::Stop);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.last_outcome, Some(RunOutcome::Completed));

        // Loop is gone: nothing more is sent.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(link.sent().len(), n);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_does_not_double_ticks() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();

        assert_eq!(controller.start().await, StartOutcome::Started);
        assert_eq!(controller.start().await, StartOutcome::AlreadyRunning);

        tokio::time::sleep(Duration::from_millis(1050)).await;
        assert_eq!(link.speed_updates().len(), 10);
        let starts = link
            .sent()
            .iter()
            .filter(|m| matches!(m, ControlMessage::Start { .. }))
            .count();
        assert_eq!(starts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_cancels_loop() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();
        controller.start().await;

        tokio::time::sleep(Duration::from_millis(350)).await;
        controller.stop().await;
        controller.stop().await;

        let updates = link.speed_updates().len();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(link.speed_updates().len(), updates);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.last_outcome, Some(RunOutcome::Stopped));
        assert_eq!(snapshot.current_setpoint, None);

        // Restart after stop is allowed.
        assert_eq!(controller.start().await, StartOutcome::Started);
    }

    #[tokio::test]
    async fn test_profile_is_frozen_while_running() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link);
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();

        let point = controller.edit_point(3, 1500.0).await.unwrap();
        assert_eq!(point.setpoint, 1500.0);

        controller.start().await;
        assert!(matches!(
            controller.configure(settings(1000.0, 2000.0, 5.0)).await,
            Err(SessionError::ProfileFrozen)
        ));
        assert!(matches!(
            controller.edit_point(4, 1.0).await,
            Err(SessionError::ProfileFrozen)
        ));
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_link_loss_aborts_run() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();
        controller.start().await;

        link.connected.store(false, Ordering::SeqCst);
        controller.on_link_lost().await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.last_outcome, Some(RunOutcome::LinkLost));
        assert!(!link.sent().contains(&ControlMessage::Stop));
    }

    #[tokio::test]
    async fn test_start_resets_statistics() {
        let link = RecordingLink::connected();
        let (controller, telemetry) = controller(link);
        telemetry
            .ingest(r#"{"thrust":9,"torque":1,"voltage":1,"current":1}"#)
            .await
            .unwrap();
        assert_ne!(telemetry.stats().await, RunningStats::default());

        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();
        controller.start().await;
        assert!(telemetry.stats().await.get(Channel::Thrust).is_unset());
        controller.stop().await;
    }

    #[tokio::test]
    async fn test_dispose_closes_link() {
        let link = RecordingLink::connected();
        let (controller, _) = controller(link.clone());
        controller.configure(settings(1200.0, 1400.0, 5.0)).await.unwrap();
        controller.start().await;

        controller.dispose().await;
        assert!(!link.is_connected());
        assert_eq!(controller.snapshot().await.phase, SessionPhase::Idle);
    }
}
