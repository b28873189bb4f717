use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling rate the recordings are acquired at.
pub const DEFAULT_FS: f64 = 256.0;

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
    /// Number of missing (NaN) samples.
    pub fn nan_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

/// Which half of the dual-channel recording an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ecg,
    Ppg,
}

impl Channel {
    /// Column of the record this channel is read from.
    pub fn record_index(self) -> usize {
        match self {
            Channel::Ecg => 0,
            Channel::Ppg => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Ecg => f.write_str("ECG"),
            Channel::Ppg => f.write_str("PPG"),
        }
    }
}

/// Multi-channel output of a record reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub fs: f64,
    pub channels: Vec<Vec<f64>>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Record {
    pub fn new(fs: f64, channels: Vec<Vec<f64>>) -> Self {
        Self {
            fs,
            channels,
            labels: Vec::new(),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }
}

/// Point events on a timeline (e.g., R-peaks indices)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Inter-event intervals (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_events(events: &Events, fs: f64) -> Self {
        let mut rr = Vec::new();
        for w in events.indices.windows(2) {
            let dt = (w[1] as f64 - w[0] as f64) / fs;
            rr.push(dt);
        }
        Self { rr }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.rr.is_empty() {
            None
        } else {
            Some(self.rr.iter().sum::<f64>() / self.rr.len() as f64)
        }
    }
}
