// Telemetry aggregator - Batches irregular samples into fixed-cadence display rows
use tokio::time::Instant;

use crate::domain::series::{format_clock_label, ChannelValues, DisplaySeries, SeriesRow};
use crate::domain::telemetry::{Channel, TelemetrySample, CHANNEL_COUNT};

#[derive(Debug)]
pub struct TelemetryAggregator {
    buffer: Vec<TelemetrySample>,
    series: DisplaySeries,
    origin: Instant,
}

impl TelemetryAggregator {
    pub fn new(origin: Instant) -> Self {
        Self {
            buffer: Vec::new(),
            series: DisplaySeries::default(),
            origin,
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.buffer.push(sample);
    }

    pub fn series(&self) -> &DisplaySeries {
        &self.series
    }

    /// Drain everything buffered since the last flush into one row of
    /// per-channel means. Returns `None` without touching the series when
    /// nothing arrived.
    pub fn flush(&mut self, now: Instant) -> Option<SeriesRow> {
        if self.buffer.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut self.buffer);

        let mut sums = [0.0f64; CHANNEL_COUNT];
        let mut counts = [0usize; CHANNEL_COUNT];
        for sample in &batch {
            for channel in Channel::ALL {
                if let Some(value) = sample.get(channel) {
                    sums[channel.index()] += value;
                    counts[channel.index()] += 1;
                }
            }
        }

        let mut values: ChannelValues = [None; CHANNEL_COUNT];
        for channel in Channel::ALL {
            let i = channel.index();
            values[i] = if counts[i] > 0 {
                Some(sums[i] / counts[i] as f64)
            } else {
                // last-value-hold
                self.series.last_value(channel)
            };
        }

        let elapsed = now.saturating_duration_since(self.origin).as_secs();
        let row = SeriesRow {
            label: format_clock_label(elapsed),
            values,
        };
        self.series.append(&row);

        tracing::debug!(samples = batch.len(), label = %row.label, "flushed telemetry batch");
        Some(row)
    }

    /// Start a fresh run: drop pending samples, clear the series, rebase labels.
    pub fn restart(&mut self, origin: Instant) {
        self.buffer.clear();
        self.series.clear();
        self.origin = origin;
    }

    pub fn clear_series(&mut self) {
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn thrust_only(thrust: f64) -> TelemetrySample {
        TelemetrySample::new(thrust, 0.0, 0.0, 0.0)
    }

    #[test]
    fn test_flush_averages_batch() {
        let origin = Instant::now();
        let mut aggregator = TelemetryAggregator::new(origin);
        aggregator.push(thrust_only(1.0));
        aggregator.push(thrust_only(3.0));

        let row = aggregator.flush(origin + Duration::from_millis(1200)).unwrap();
        assert_eq!(row.values[Channel::Thrust.index()], Some(2.0));
        assert_eq!(row.label, "00:01");
        assert_eq!(aggregator.series().len(), 1);
        assert!(aggregator.flush(origin + Duration::from_millis(1300)).is_none());
    }

    #[test]
    fn test_empty_flush_is_noop() {
        let origin = Instant::now();
        let mut aggregator = TelemetryAggregator::new(origin);
        assert!(aggregator.flush(origin).is_none());
        assert!(aggregator.series().is_empty());

        aggregator.push(thrust_only(4.0));
        aggregator.flush(origin);
        assert!(aggregator.flush(origin + Duration::from_millis(100)).is_none());
        assert_eq!(aggregator.series().len(), 1);
    }

    #[test]
    fn test_missing_channel_holds_last_value() {
        let origin = Instant::now();
        let mut aggregator = TelemetryAggregator::new(origin);

        aggregator.push(thrust_only(1.0).with_speed(1250.0));
        aggregator.flush(origin);

        aggregator.push(thrust_only(2.0));
        let row = aggregator.flush(origin + Duration::from_millis(100)).unwrap();
        assert_eq!(row.values[Channel::Speed.index()], Some(1250.0));
        assert_eq!(row.values[Channel::Thrust.index()], Some(2.0));
    }

    #[test]
    fn test_missing_channel_without_history_is_none() {
        let origin = Instant::now();
        let mut aggregator = TelemetryAggregator::new(origin);
        aggregator.push(thrust_only(1.0));
        let row = aggregator.flush(origin).unwrap();
        assert_eq!(row.values[Channel::Speed.index()], None);
    }

    #[test]
    fn test_restart_clears_and_rebases() {
        let origin = Instant::now();
        let mut aggregator = TelemetryAggregator::new(origin);
        aggregator.push(thrust_only(1.0));
        aggregator.flush(origin);
        aggregator.push(thrust_only(9.0));

        let later = origin + Duration::from_secs(90);
        aggregator.restart(later);
        assert!(aggregator.series().is_empty());
        assert!(aggregator.flush(later).is_none());

        aggregator.push(thrust_only(5.0));
        let row = aggregator.flush(later + Duration::from_secs(61)).unwrap();
        assert_eq!(row.label, "01:01");
    }
}
