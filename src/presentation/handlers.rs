// HTTP request handlers
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::application::peer_link::PeerLink;
use crate::application::report_archive::ArchiveError;
use crate::application::report_service::ReportRequest;
use crate::application::session_controller::SessionError;
use crate::domain::ramp::{RampProfile, RampSettings};
use crate::domain::session::{SessionSnapshot, StartOutcome};
use crate::infrastructure::chunked_feed::feed_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, document_response, error_response};
use crate::presentation::app_state::AppState;

type Shared = State<Arc<AppState>>;

#[derive(Serialize)]
pub struct ProfilePoint {
    pub elapsed_ms: u64,
    pub setpoint: f64,
    pub label: String,
}

#[derive(Serialize)]
pub struct ProfileView {
    pub settings: Option<RampSettings>,
    pub points: Vec<ProfilePoint>,
}

impl ProfileView {
    fn new(settings: Option<RampSettings>, profile: &RampProfile) -> Self {
        let points = profile
            .points()
            .iter()
            .zip(profile.preview_labels())
            .map(|(p, label)| ProfilePoint {
                elapsed_ms: p.elapsed_ms,
                setpoint: p.setpoint,
                label,
            })
            .collect();
        Self { settings, points }
    }
}

#[derive(Deserialize)]
pub struct PointEdit {
    pub setpoint: f64,
}

#[derive(Serialize)]
pub struct StartResponse {
    pub outcome: StartOutcome,
    pub session: SessionSnapshot,
}

#[derive(Deserialize, Default)]
pub struct ConnectRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub file_name: String,
}

fn session_error(e: SessionError) -> Response {
    match e {
        SessionError::ProfileFrozen => error_response(StatusCode::CONFLICT, e),
        SessionError::Ramp(_) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

fn archive_error(e: ArchiveError) -> Response {
    match e {
        ArchiveError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e),
        ArchiveError::InvalidName(_) => error_response(StatusCode::BAD_REQUEST, e),
        ArchiveError::Io(_) | ArchiveError::Index(_) => {
            tracing::error!("report archive failure: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Dashboard feature flags and ramp input bounds
pub async fn view_config(State(state): Shared) -> impl IntoResponse {
    Json(serde_json::json!({
        "view": state.view,
        "ramp": {
            "defaults": state.ramp.settings(),
            "limits": state.ramp.limits(),
        },
    }))
}

pub async fn get_profile(State(state): Shared) -> impl IntoResponse {
    let profile = state.session.profile().await;
    Json(ProfileView::new(state.session.settings().await, &profile))
}

/// Regenerate the ramp from operator settings
pub async fn configure_profile(
    State(state): Shared,
    Json(settings): Json<RampSettings>,
) -> Response {
    if let Err(e) = settings.check(&state.ramp.limits()) {
        return error_response(StatusCode::BAD_REQUEST, e);
    }
    match state.session.configure(settings).await {
        Ok(profile) => Json(ProfileView::new(Some(settings), &profile)).into_response(),
        Err(e) => session_error(e),
    }
}

/// Drag-edit of a single preview point
pub async fn edit_profile_point(
    Path(index): Path<usize>,
    State(state): Shared,
    Json(edit): Json<PointEdit>,
) -> Response {
    match state.session.edit_point(index, edit.setpoint).await {
        Ok(point) => Json(point).into_response(),
        Err(e) => session_error(e),
    }
}

pub async fn get_session(State(state): Shared) -> impl IntoResponse {
    Json(state.session.snapshot().await)
}

pub async fn start_session(State(state): Shared) -> impl IntoResponse {
    let outcome = state.session.start().await;
    Json(StartResponse {
        outcome,
        session: state.session.snapshot().await,
    })
}

pub async fn stop_session(State(state): Shared) -> impl IntoResponse {
    state.session.stop().await;
    Json(state.session.snapshot().await)
}

pub async fn get_stats(State(state): Shared) -> impl IntoResponse {
    Json(state.telemetry.stats().await)
}

pub async fn get_series(State(state): Shared) -> impl IntoResponse {
    Json(state.telemetry.series().await)
}

pub async fn clear_series(State(state): Shared) -> StatusCode {
    state.telemetry.clear_series().await;
    StatusCode::NO_CONTENT
}

/// Stream live dashboard events as NDJSON
pub async fn stream_feed(State(state): Shared) -> impl IntoResponse {
    feed_from_receiver(state.events.subscribe())
}

pub async fn link_status(State(state): Shared) -> impl IntoResponse {
    Json(serde_json::json!({
        "connected": state.channel.is_connected(),
        "endpoint": state.channel.endpoint().await,
        "rejected_frames": state.telemetry.rejected_frames().await,
    }))
}

/// (Re)open the channel to the rig, superseding the current one
pub async fn connect_link(State(state): Shared, body: Option<Json<ConnectRequest>>) -> Response {
    let endpoint = body
        .and_then(|Json(request)| request.endpoint)
        .unwrap_or_else(|| state.peer_endpoint.clone());

    match state.channel.connect(&endpoint).await {
        Ok(()) => Json(serde_json::json!({ "connected": true, "endpoint": endpoint }))
            .into_response(),
        Err(e) => {
            tracing::warn!("{}", e);
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

/// Archive the current run as a report
pub async fn create_report(State(state): Shared, Json(request): Json<ReportRequest>) -> Response {
    match state.reports.archive_run(request).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => archive_error(e),
    }
}

pub async fn list_reports(State(state): Shared) -> Response {
    match state.reports.list().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => archive_error(e),
    }
}

pub async fn download_report(
    Path(id): Path<u64>,
    headers: HeaderMap,
    State(state): Shared,
) -> Response {
    let compress = accepts_brotli(&headers);
    match state.reports.fetch(id).await {
        Ok((record, document)) => {
            match document_response(&record.file_name, document, compress).await {
                Ok(response) => response,
                Err(status) => status.into_response(),
            }
        }
        Err(e) => archive_error(e),
    }
}

pub async fn rename_report(
    Path(id): Path<u64>,
    State(state): Shared,
    Json(request): Json<RenameRequest>,
) -> Response {
    match state.reports.rename(id, &request.file_name).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => archive_error(e),
    }
}

pub async fn delete_report(Path(id): Path<u64>, State(state): Shared) -> Response {
    match state.reports.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => archive_error(e),
    }
}
