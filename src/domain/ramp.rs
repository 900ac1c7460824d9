// Ramp profile domain model - Planned speed trajectory for a timed run
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::series::format_clock_label;

/// Sampling step between consecutive profile points.
pub const RAMP_STEP_MS: u64 = 100;

/// Longest profile the generator will build: one hour at one point per step.
pub const MAX_PROFILE_POINTS: usize = 36_001;

/// Longest run any configuration may allow; fills exactly [`MAX_PROFILE_POINTS`].
pub const MAX_DURATION_SECONDS: f64 = 3600.0;

#[derive(Debug, Error, PartialEq)]
pub enum RampError {
    #[error("profile point {index} does not exist (profile has {len} points)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("setpoint must be a finite number")]
    NonFiniteSetpoint,
    #[error("duration must be greater than zero seconds")]
    NonPositiveDuration,
    #[error("duration {value} s exceeds the {max} s limit")]
    DurationTooLong { value: f64, max: f64 },
    #[error("curvature {value} is outside [{min}, {max}]")]
    CurvatureOutOfRange { value: f64, min: f64, max: f64 },
}

/// Operator-facing ramp parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampSettings {
    pub start_value: f64,
    pub end_value: f64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub curvature: f64,
}

/// Bounds on operator input, taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampLimits {
    pub curvature_min: f64,
    pub curvature_max: f64,
    pub max_duration_seconds: f64,
}

impl RampSettings {
    /// Reject settings an operator should be told about. Unset endpoints are
    /// not an error here; they simply generate an empty profile.
    pub fn check(&self, limits: &RampLimits) -> Result<(), RampError> {
        if !(self.duration_seconds > 0.0) {
            return Err(RampError::NonPositiveDuration);
        }
        let max = limits.max_duration_seconds.min(MAX_DURATION_SECONDS);
        if !(self.duration_seconds <= max) {
            return Err(RampError::DurationTooLong {
                value: self.duration_seconds,
                max,
            });
        }
        if !(limits.curvature_min..=limits.curvature_max).contains(&self.curvature) {
            return Err(RampError::CurvatureOutOfRange {
                value: self.curvature,
                min: limits.curvature_min,
                max: limits.curvature_max,
            });
        }
        Ok(())
    }

    pub fn duration_ms(&self) -> u64 {
        if self.duration_seconds > 0.0 && self.duration_seconds.is_finite() {
            (self.duration_seconds * 1000.0).round() as u64
        } else {
            0
        }
    }

    pub fn generate(&self) -> RampProfile {
        RampProfile::generate(
            self.start_value,
            self.end_value,
            self.duration_seconds,
            self.curvature,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampPoint {
    pub elapsed_ms: u64,
    pub setpoint: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RampProfile {
    points: Vec<RampPoint>,
}

/// Map normalized time `t` in `[0, 1]` onto ramp progress.
///
/// `curvature == 0` is linear. Positive curvature uses `t^(1/c)` and front-loads
/// the ramp; negative curvature uses `t^(-c)` and back-loads it.
pub fn ramp_progress(t: f64, curvature: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if curvature > 0.0 {
        t.powf(1.0 / curvature)
    } else if curvature < 0.0 {
        t.powf(-curvature)
    } else {
        t
    }
}

impl RampProfile {
    /// Sample the ramp every 100 ms over `[0, duration]`.
    ///
    /// Returns an empty profile when the inputs mean "not configured yet":
    /// non-positive duration, a zero endpoint, or any non-finite value.
    /// Durations past [`MAX_DURATION_SECONDS`] also yield an empty profile.
    pub fn generate(start: f64, end: f64, duration_seconds: f64, curvature: f64) -> Self {
        let configured = duration_seconds > 0.0
            && start != 0.0
            && end != 0.0
            && [start, end, duration_seconds, curvature]
                .iter()
                .all(|v| v.is_finite());
        if !configured {
            return Self::default();
        }

        let duration_ms = duration_seconds * 1000.0;
        let steps = (duration_ms / RAMP_STEP_MS as f64).floor();
        if steps >= MAX_PROFILE_POINTS as f64 {
            return Self::default();
        }
        let count = steps as usize + 1;
        let mut points = Vec::with_capacity(count);

        for i in 0..count {
            let elapsed_ms = i as u64 * RAMP_STEP_MS;
            let progress = ramp_progress(elapsed_ms as f64 / duration_ms, curvature);
            points.push(RampPoint {
                elapsed_ms,
                setpoint: start + (end - start) * progress,
            });
        }

        // Endpoints are exact regardless of float rounding or a duration that
        // is not a multiple of the step.
        if let Some(first) = points.first_mut() {
            first.setpoint = start;
        }
        if let Some(last) = points.last_mut() {
            last.setpoint = end;
        }

        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[RampPoint] {
        &self.points
    }

    pub fn first_setpoint(&self) -> Option<f64> {
        self.points.first().map(|p| p.setpoint)
    }

    pub fn last_setpoint(&self) -> Option<f64> {
        self.points.last().map(|p| p.setpoint)
    }

    /// Setpoint scheduled at `elapsed_ms` into a run of `duration_ms`.
    /// Indexes proportionally, so an edited profile is followed point by point.
    pub fn setpoint_at(&self, elapsed_ms: u64, duration_ms: u64) -> Option<f64> {
        if self.points.is_empty() || duration_ms == 0 {
            return None;
        }
        let fraction = (elapsed_ms as f64 / duration_ms as f64).min(1.0);
        let index = (fraction * (self.points.len() - 1) as f64).floor() as usize;
        self.points.get(index).map(|p| p.setpoint)
    }

    /// Overwrite one point in place. Neighbours are left untouched.
    pub fn set_setpoint(&mut self, index: usize, value: f64) -> Result<(), RampError> {
        if !value.is_finite() {
            return Err(RampError::NonFiniteSetpoint);
        }
        let len = self.points.len();
        let point = self
            .points
            .get_mut(index)
            .ok_or(RampError::IndexOutOfRange { index, len })?;
        point.setpoint = value;
        Ok(())
    }

    /// `mm:ss` label per point for the preview chart.
    pub fn preview_labels(&self) -> Vec<String> {
        self.points
            .iter()
            .map(|p| format_clock_label(p.elapsed_ms / 1000))
            .collect()
    }
}
