// Display series domain model - Aggregated rows consumed by the chart widget
use serde::Serialize;

use super::telemetry::{Channel, CHANNEL_COUNT};

/// Format whole seconds as `mm:ss`, both fields zero-padded.
pub fn format_clock_label(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Per-channel values of one row, indexed by [`Channel::index`].
pub type ChannelValues = [Option<f64>; CHANNEL_COUNT];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub label: String,
    pub values: ChannelValues,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesChannel {
    pub channel: Channel,
    pub title: &'static str,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySeries {
    pub labels: Vec<String>,
    pub channels: Vec<SeriesChannel>,
}

impl Default for DisplaySeries {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            channels: Channel::ALL
                .iter()
                .map(|&channel| SeriesChannel {
                    channel,
                    title: channel.title(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }
}

impl DisplaySeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
        for channel in &mut self.channels {
            channel.values.clear();
        }
    }

    pub fn last_value(&self, channel: Channel) -> Option<f64> {
        self.channels[channel.index()]
            .values
            .last()
            .copied()
            .flatten()
    }

    pub fn append(&mut self, row: &SeriesRow) {
        self.labels.push(row.label.clone());
        for (column, value) in self.channels.iter_mut().zip(row.values.iter()) {
            column.values.push(*value);
        }
    }
}
