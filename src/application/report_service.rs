// Report service - Snapshot the current run and archive it
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::application::report_archive::{check_file_name, ArchiveError, ReportArchive};
use crate::application::session_controller::SessionController;
use crate::application::telemetry_pipeline::TelemetryPipeline;
use crate::domain::report::{ReportRecord, RigComponents, RunReport};
use crate::domain::telemetry::Channel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default, flatten)]
    pub components: RigComponents,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone)]
pub struct ReportService {
    archive: Arc<dyn ReportArchive>,
    session: SessionController,
    telemetry: TelemetryPipeline,
}

impl ReportService {
    pub fn new(
        archive: Arc<dyn ReportArchive>,
        session: SessionController,
        telemetry: TelemetryPipeline,
    ) -> Self {
        Self {
            archive,
            session,
            telemetry,
        }
    }

    pub async fn build_report(&self, request: &ReportRequest) -> RunReport {
        let snapshot = self.session.snapshot().await;
        let ramp = self.session.settings().await;
        let comment = request
            .comment
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        RunReport {
            generated_at: Utc::now(),
            components: request.components.clone(),
            comment,
            ramp,
            duration_label: RunReport::format_duration(snapshot.duration_ms / 1000),
            last_setpoint: snapshot.current_setpoint,
            stats: self.telemetry.stats().await,
            series: self.telemetry.series().await,
        }
    }

    pub async fn archive_run(&self, request: ReportRequest) -> Result<ReportRecord, ArchiveError> {
        let report = self.build_report(&request).await;
        let file_name = match request.file_name.as_deref() {
            Some(name) => check_file_name(name)?.to_string(),
            None => RunReport::default_file_name(report.generated_at),
        };

        if Channel::ALL.iter().all(|&c| report.stats.get(c).is_unset()) {
            tracing::warn!("archiving a report with no telemetry samples");
        }

        let document = serde_json::to_vec_pretty(&report)?;
        let record = self.archive.add(&file_name, &document).await.map_err(|e| {
            tracing::error!(file_name = %file_name, "failed to archive report: {}", e);
            e
        })?;

        tracing::info!(id = record.id, file_name = %record.file_name, "report archived");
        Ok(record)
    }

    pub async fn list(&self) -> Result<Vec<ReportRecord>, ArchiveError> {
        self.archive.list().await
    }

    pub async fn fetch(&self, id: u64) -> Result<(ReportRecord, Vec<u8>), ArchiveError> {
        self.archive.fetch(id).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), ArchiveError> {
        self.archive.delete(id).await
    }

    pub async fn rename(&self, id: u64, file_name: &str) -> Result<ReportRecord, ArchiveError> {
        let file_name = check_file_name(file_name)?;
        self.archive.rename(id, file_name).await
    }
}
