// Application state for HTTP handlers
use std::sync::Arc;

use crate::application::events::EventBus;
use crate::application::report_service::ReportService;
use crate::application::session_controller::SessionController;
use crate::application::telemetry_pipeline::TelemetryPipeline;
use crate::infrastructure::config::{RampDefaults, ViewConfig};
use crate::infrastructure::ws_channel::ChannelAdapter;

#[derive(Clone)]
pub struct AppState {
    pub session: SessionController,
    pub telemetry: TelemetryPipeline,
    pub reports: ReportService,
    pub channel: Arc<ChannelAdapter>,
    pub events: EventBus,
    pub view: ViewConfig,
    pub ramp: RampDefaults,
    pub peer_endpoint: String,
}
