use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ramp::{RampLimits, RampSettings, MAX_DURATION_SECONDS};

#[derive(Debug, Deserialize, Clone)]
pub struct RigConfig {
    pub server: ServerSettings,
    pub peer: PeerSettings,
    pub timing: TimingSettings,
    pub ramp: RampDefaults,
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PeerSettings {
    pub endpoint: String,
    pub connect_on_startup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingSettings {
    pub setpoint_interval_ms: u64,
    pub flush_interval_ms: u64,
}

impl TimingSettings {
    pub fn setpoint_interval(&self) -> Duration {
        Duration::from_millis(self.setpoint_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RampDefaults {
    pub start_value: f64,
    pub end_value: f64,
    pub duration_seconds: f64,
    pub curvature: f64,
    pub curvature_min: f64,
    pub curvature_max: f64,
    pub max_duration_seconds: f64,
}

impl RampDefaults {
    pub fn settings(&self) -> RampSettings {
        RampSettings {
            start_value: self.start_value,
            end_value: self.end_value,
            duration_seconds: self.duration_seconds,
            curvature: self.curvature,
        }
    }

    pub fn limits(&self) -> RampLimits {
        RampLimits {
            curvature_min: self.curvature_min,
            curvature_max: self.curvature_max,
            max_duration_seconds: self.max_duration_seconds,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveSettings {
    pub directory: PathBuf,
}

/// Optional dashboard controls. One view, toggled per rig.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ViewConfig {
    #[serde(default)]
    pub show_acceleration_control: bool,
    #[serde(default)]
    pub show_esc_field: bool,
    #[serde(default)]
    pub show_comment_field: bool,
}

pub fn load_rig_config() -> anyhow::Result<RigConfig> {
    load_rig_config_from("config/rig")
}

/// Defaults, then the optional file at `path`, then `RIG__SECTION__KEY` variables.
pub fn load_rig_config_from(path: &str) -> anyhow::Result<RigConfig> {
    let settings = config::Config::builder()
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("peer.endpoint", "ws://esp32-motortester.local:8080")?
        .set_default("peer.connect_on_startup", true)?
        .set_default("timing.setpoint_interval_ms", 100_i64)?
        .set_default("timing.flush_interval_ms", 100_i64)?
        .set_default("ramp.start_value", 1200.0)?
        .set_default("ramp.end_value", 1400.0)?
        .set_default("ramp.duration_seconds", 5.0)?
        .set_default("ramp.curvature", 0.0)?
        .set_default("ramp.curvature_min", -5.0)?
        .set_default("ramp.curvature_max", 5.0)?
        .set_default("ramp.max_duration_seconds", 600.0)?
        .set_default("archive.directory", "data/reports")?
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("RIG")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: RigConfig = settings.try_deserialize()?;
    config.check()?;
    Ok(config)
}

impl RigConfig {
    fn check(&self) -> anyhow::Result<()> {
        if self.timing.setpoint_interval_ms == 0 || self.timing.flush_interval_ms == 0 {
            anyhow::bail!("timing intervals must be at least 1 ms");
        }
        if !(self.ramp.curvature_min < self.ramp.curvature_max) {
            anyhow::bail!(
                "ramp.curvature_min ({}) must be below ramp.curvature_max ({})",
                self.ramp.curvature_min,
                self.ramp.curvature_max
            );
        }
        if !(self.ramp.max_duration_seconds > 0.0
            && self.ramp.max_duration_seconds <= MAX_DURATION_SECONDS)
        {
            anyhow::bail!(
                "ramp.max_duration_seconds ({}) must be in (0, {}]",
                self.ramp.max_duration_seconds,
                MAX_DURATION_SECONDS
            );
        }
        self.ramp.settings().check(&self.ramp.limits())?;
        Ok(())
    }
}
