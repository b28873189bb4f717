use crate::signal::{Events, RRSeries};
use serde::{Deserialize, Serialize};

/// Beats (or pulses) per minute derived from detected peaks.
///
/// `bpm` is `None` when fewer than two peaks were found. The estimate is a
/// plain mean of the intervals: a single missed or spurious peak shifts it
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub bpm: Option<f64>,
    pub intervals: RRSeries,
}

impl RateEstimate {
    pub fn is_determined(&self) -> bool {
        self.bpm.is_some()
    }

    /// Human-readable summary, e.g. for plot annotations.
    pub fn describe(&self) -> String {
        match self.bpm {
            Some(bpm) => format!("Estimated Heart Rate: {bpm:.2} BPM"),
            None => "No peaks detected".to_string(),
        }
    }
}

pub fn estimate_rate(peaks: &Events, fs: f64) -> RateEstimate {
    let intervals = RRSeries::from_events(peaks, fs);
    let bpm = intervals
        .mean()
        .filter(|mean| *mean > 0.0)
        .map(|mean| 60.0 / mean);
    RateEstimate { bpm, intervals }
}
