//! Analysis session: the state a user builds up between loading a record and
//! asking for peaks, rates and spectra.
//!
//! A session moves `Empty -> Loaded -> Preprocessed`. Loading again drops any
//! filtered data and returns the session to `Loaded`. Sessions share nothing,
//! so any number of them can live side by side.

use crate::{
    config::AnalysisConfig,
    detectors::peaks::find_peaks,
    error::{AnalysisError, AnalysisResult},
    filter::{apply::filtfilt, design::FilterSpec},
    metrics::{
        psd::{estimate_psd, SpectralEstimate},
        rate::{estimate_rate, RateEstimate},
    },
    signal::{Channel, Events, Record, TimeSeries, DEFAULT_FS},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Empty,
    Loaded,
    Preprocessed,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Loaded => "loaded",
            SessionState::Preprocessed => "preprocessed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
struct ChannelPair {
    ecg: TimeSeries,
    ppg: TimeSeries,
}

impl ChannelPair {
    fn get(&self, channel: Channel) -> &TimeSeries {
        match channel {
            Channel::Ecg => &self.ecg,
            Channel::Ppg => &self.ppg,
        }
    }
}

/// What `load` found in the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub fs: f64,
    pub record_fs: f64,
    pub channels: usize,
    pub ecg_samples: usize,
    pub ppg_samples: usize,
    pub ecg_missing: usize,
    pub ppg_missing: usize,
    /// Column labels from the record, when it has any
    pub ecg_label: Option<String>,
    pub ppg_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub filter: FilterSpec,
    /// PPG samples that were missing and replaced by zero
    pub ppg_replaced: usize,
}

/// Peaks and rate for one window of a filtered channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    pub channel: Channel,
    pub start: usize,
    pub end: usize,
    /// Filtered samples of `[start, end)`
    pub samples: Vec<f64>,
    /// Indices relative to `start`
    pub peaks: Events,
    pub rate: RateEstimate,
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    fs: f64,
    raw: Option<ChannelPair>,
    filtered: Option<ChannelPair>,
    filter_spec: Option<FilterSpec>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(DEFAULT_FS)
    }
}

impl AnalysisSession {
    /// `fs` is the rate all computations assume, whatever the record claims.
    pub fn new(fs: f64) -> Self {
        Self {
            fs,
            raw: None,
            filtered: None,
            filter_spec: None,
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.fs)
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }

    pub fn state(&self) -> SessionState {
        match (&self.raw, &self.filtered) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::Loaded,
            (Some(_), Some(_)) => SessionState::Preprocessed,
        }
    }

    /// Take channel 0 as ECG and channel 1 as PPG.
    ///
    /// Missing samples are counted and reported but left in place. On failure
    /// the session keeps whatever it held before.
    pub fn load(&mut self, record: Record) -> AnalysisResult<LoadReport> {
        let found = record.channel_count();
        if found < 2 {
            return Err(AnalysisError::MissingChannel { found });
        }
        if (record.fs - self.fs).abs() > f64::EPSILON {
            warn!(
                "record sampled at {} Hz; analysing at {} Hz",
                record.fs, self.fs
            );
        }
        let label_of = |channel: Channel| {
            record
                .label(channel.record_index())
                .filter(|label| !label.is_empty())
                .map(str::to_string)
        };
        let (ecg_label, ppg_label) = (label_of(Channel::Ecg), label_of(Channel::Ppg));
        let mut columns = record.channels;
        let ecg = std::mem::take(&mut columns[Channel::Ecg.record_index()]);
        let ppg = std::mem::take(&mut columns[Channel::Ppg.record_index()]);
        let pair = ChannelPair {
            ecg: TimeSeries::new(self.fs, ecg),
            ppg: TimeSeries::new(self.fs, ppg),
        };
        if pair.ecg.len() != pair.ppg.len() {
            warn!(
                "channel lengths differ: ECG {} samples, PPG {} samples",
                pair.ecg.len(),
                pair.ppg.len()
            );
        }

        let report = LoadReport {
            fs: self.fs,
            record_fs: record.fs,
            channels: found,
            ecg_samples: pair.ecg.len(),
            ppg_samples: pair.ppg.len(),
            ecg_missing: pair.ecg.nan_count(),
            ppg_missing: pair.ppg.nan_count(),
            ecg_label,
            ppg_label,
        };
        for (channel, missing) in [
            (Channel::Ecg, report.ecg_missing),
            (Channel::Ppg, report.ppg_missing),
        ] {
            if missing > 0 {
                warn!("{missing} missing samples in the raw {channel} signal");
            }
        }

        self.raw = Some(pair);
        self.filtered = None;
        self.filter_spec = None;
        info!(
            "loaded {} samples per channel from a {}-channel record",
            report.ecg_samples, found
        );
        Ok(report)
    }

    /// Zero-fill missing PPG samples, then filter both channels.
    ///
    /// Only PPG is cleaned, and the cleaning is kept in the raw PPG signal.
    /// Missing ECG samples pass through the filter untouched. On failure the
    /// session is left exactly as it was.
    pub fn preprocess(&mut self, spec: &FilterSpec) -> AnalysisResult<PreprocessReport> {
        let state = self.state();
        let Some(raw) = self.raw.as_mut() else {
            return Err(AnalysisError::NotReady {
                operation: "preprocess",
                required: SessionState::Loaded.name(),
                current: state.name(),
            });
        };

        let coeffs = spec.design(self.fs)?;
        let mut cleaned_ppg = raw.ppg.data.clone();
        let mut ppg_replaced = 0;
        for sample in cleaned_ppg.iter_mut().filter(|v| v.is_nan()) {
            *sample = 0.0;
            ppg_replaced += 1;
        }

        let ecg = filtfilt(&coeffs, &raw.ecg.data)?;
        let ppg = filtfilt(&coeffs, &cleaned_ppg)?;
        if ppg_replaced > 0 {
            info!("replaced {ppg_replaced} missing PPG samples with zero");
        }
        raw.ppg.data = cleaned_ppg;
        self.filtered = Some(ChannelPair {
            ecg: TimeSeries::new(self.fs, ecg),
            ppg: TimeSeries::new(self.fs, ppg),
        });
        self.filter_spec = Some(*spec);
        info!("preprocessed both channels with {:?} filter", spec.kind);
        Ok(PreprocessReport {
            filter: *spec,
            ppg_replaced,
        })
    }

    /// Detect peaks in `[start, end)` of a filtered channel and estimate the rate.
    pub fn analyze_segment(
        &self,
        channel: Channel,
        start: usize,
        end: usize,
        min_height: f64,
        min_distance: usize,
    ) -> AnalysisResult<SegmentAnalysis> {
        let filtered = self.require_filtered("analyze_segment")?.get(channel);
        let len = filtered.len();
        if start >= end || end > len {
            return Err(AnalysisError::OutOfRange { start, end, len });
        }
        let samples = filtered.data[start..end].to_vec();
        let peaks = find_peaks(&samples, min_height, min_distance);
        let rate = estimate_rate(&peaks, self.fs);
        info!(
            "{channel} [{start}, {end}): {} peaks, {}",
            peaks.len(),
            rate.describe()
        );
        Ok(SegmentAnalysis {
            channel,
            start,
            end,
            samples,
            peaks,
            rate,
        })
    }

    /// Welch PSD of the filtered ECG channel.
    pub fn spectral_density(&self, segment_length: usize) -> AnalysisResult<SpectralEstimate> {
        let ecg = &self.require_filtered("spectral_density")?.ecg;
        estimate_psd(&ecg.data, self.fs, segment_length)
    }

    pub fn raw(&self, channel: Channel) -> Option<&TimeSeries> {
        self.raw.as_ref().map(|pair| pair.get(channel))
    }

    pub fn filtered(&self, channel: Channel) -> Option<&TimeSeries> {
        self.filtered.as_ref().map(|pair| pair.get(channel))
    }

    /// Filter behind the current filtered signals.
    pub fn filter_spec(&self) -> Option<&FilterSpec> {
        self.filter_spec.as_ref()
    }

    fn require_filtered(&self, operation: &'static str) -> AnalysisResult<&ChannelPair> {
        self.filtered.as_ref().ok_or(AnalysisError::NotReady {
            operation,
            required: SessionState::Preprocessed.name(),
            current: self.state().name(),
        })
    }
}
