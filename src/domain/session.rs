// Session domain model - Test run lifecycle and control messages
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
}

/// How the most recent run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Stopped,
    LinkLost,
}

/// Result of a start request. Refusals are not errors; the operator retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    NotReady,
    Disconnected,
}

/// Messages sent to the rig controller as JSON text frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    Start { duration: u64, speed: f64 },
    Stop,
    SpeedUpdate { speed: f64 },
}

/// Whole seconds left in a run, as `m:ss`.
pub fn format_time_remaining(duration_ms: u64, elapsed_ms: u64) -> String {
    let remaining = (duration_ms / 1000).saturating_sub(elapsed_ms / 1000);
    format!("{}:{:02}", remaining / 60, remaining % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub duration_ms: u64,
    pub elapsed_ms: Option<u64>,
    pub elapsed_label: Option<String>,
    pub time_remaining: String,
    pub current_setpoint: Option<f64>,
    pub profile_points: usize,
    pub last_outcome: Option<RunOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_wire_format() {
        let start = serde_json::to_string(&ControlMessage::Start {
            duration: 5000,
            speed: 1200.0,
        })
        .unwrap();
        assert_eq!(start, r#"{"type":"start","duration":5000,"speed":1200.0}"#);

        let stop = serde_json::to_string(&ControlMessage::Stop).unwrap();
        assert_eq!(stop, r#"{"type":"stop"}"#);

        let update = serde_json::to_string(&ControlMessage::SpeedUpdate { speed: 1300.5 }).unwrap();
        assert_eq!(update, r#"{"type":"speedUpdate","speed":1300.5}"#);
    }

    #[test]
    fn test_time_remaining() {
        assert_eq!(format_time_remaining(5000, 0), "0:05");
        assert_eq!(format_time_remaining(125_000, 4_900), "2:01");
        assert_eq!(format_time_remaining(5000, 9000), "0:00");
    }
}
