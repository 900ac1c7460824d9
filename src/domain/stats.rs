// Running statistics - Per-channel extrema over the current run
use serde::Serialize;

use super::telemetry::{Channel, TelemetrySample};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extrema {
    /// Serialized as `null` until the first sample arrives.
    pub max: f64,
    pub min: f64,
}

impl Default for Extrema {
    fn default() -> Self {
        Self {
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
        }
    }
}

impl Extrema {
    pub fn fold(&mut self, value: f64) {
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }

    pub fn is_unset(&self) -> bool {
        self.max == f64::NEG_INFINITY && self.min == f64::INFINITY
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunningStats {
    thrust: Extrema,
    torque: Extrema,
    voltage: Extrema,
    current: Extrema,
    speed: Extrema,
}

impl RunningStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, sample: &TelemetrySample) {
        for channel in Channel::ALL {
            if let Some(value) = sample.get(channel) {
                self.extrema_mut(channel).fold(value);
            }
        }
    }

    pub fn get(&self, channel: Channel) -> Extrema {
        match channel {
            Channel::Thrust => self.thrust,
            Channel::Torque => self.torque,
            Channel::Voltage => self.voltage,
            Channel::Current => self.current,
            Channel::Speed => self.speed,
        }
    }

    fn extrema_mut(&mut self, channel: Channel) -> &mut Extrema {
        match channel {
            Channel::Thrust => &mut self.thrust,
            Channel::Torque => &mut self.torque,
            Channel::Voltage => &mut self.voltage,
            Channel::Current => &mut self.current,
            Channel::Speed => &mut self.speed,
        }
    }
}
