// Telemetry domain models - Sensor samples and their schema check
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Measured quantities, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Thrust,
    Torque,
    Voltage,
    Current,
    Speed,
}

pub const CHANNEL_COUNT: usize = 5;

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Thrust,
        Channel::Torque,
        Channel::Voltage,
        Channel::Current,
        Channel::Speed,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Channel::Thrust => "thrust",
            Channel::Torque => "torque",
            Channel::Voltage => "voltage",
            Channel::Current => "current",
            Channel::Speed => "speed",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Channel::Thrust => "Thrust",
            Channel::Torque => "Torque",
            Channel::Voltage => "Voltage",
            Channel::Current => "Current",
            Channel::Speed => "Speed",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("telemetry frame is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("telemetry frame is not a JSON object")]
    NotAnObject,
    #[error("telemetry field `{0}` is missing")]
    MissingField(&'static str),
    #[error("telemetry field `{0}` is not a number")]
    NotANumber(&'static str),
}

/// One instant reading from the rig.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub thrust: f64,
    pub torque: f64,
    pub voltage: f64,
    pub current: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl TelemetrySample {
    pub fn new(thrust: f64, torque: f64, voltage: f64, current: f64) -> Self {
        Self {
            thrust,
            torque,
            voltage,
            current,
            speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Thrust => Some(self.thrust),
            Channel::Torque => Some(self.torque),
            Channel::Voltage => Some(self.voltage),
            Channel::Current => Some(self.current),
            Channel::Speed => self.speed,
        }
    }

    /// Parse and check a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::validate(&value)
    }

    /// Structural check against the telemetry schema. Unknown keys are ignored;
    /// `speed` may be absent but must be numeric when present.
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;

        let required = |channel: Channel| -> Result<f64, ValidationError> {
            let key = channel.key();
            object
                .get(key)
                .ok_or(ValidationError::MissingField(key))?
                .as_f64()
                .ok_or(ValidationError::NotANumber(key))
        };

        let sample = Self::new(
            required(Channel::Thrust)?,
            required(Channel::Torque)?,
            required(Channel::Voltage)?,
            required(Channel::Current)?,
        );

        match object.get(Channel::Speed.key()) {
            None => Ok(sample),
            Some(v) => v
                .as_f64()
                .map(|speed| sample.with_speed(speed))
                .ok_or(ValidationError::NotANumber("speed")),
        }
    }
}
