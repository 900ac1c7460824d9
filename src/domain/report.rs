// Report domain models - Archived run documents
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ramp::RampSettings;
use super::series::DisplaySeries;
use super::stats::RunningStats;

/// Free-text identifiers the operator attaches to a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigComponents {
    #[serde(default)]
    pub motor_model: String,
    #[serde(default)]
    pub propeller_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esc_model: Option<String>,
}

/// Document body written to the archive.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub components: RigComponents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub ramp: Option<RampSettings>,
    pub duration_label: String,
    pub last_setpoint: Option<f64>,
    pub stats: RunningStats,
    pub series: DisplaySeries,
}

impl RunReport {
    pub fn default_file_name(generated_at: DateTime<Utc>) -> String {
        format!("chart-{}.json", generated_at.format("%Y%m%d-%H%M%S"))
    }

    /// `N minutes SS seconds`, as the printed test info shows it.
    pub fn format_duration(duration_seconds: u64) -> String {
        format!(
            "{} minutes {:02} seconds",
            duration_seconds / 60,
            duration_seconds % 60
        )
    }
}

/// Archive metadata; the document bytes are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: u64,
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
