use crate::{
    filter::design::{FilterPreset, DEFAULT_ORDER},
    metrics::psd::DEFAULT_PSD_SEGMENT,
    signal::DEFAULT_FS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Analysis parameters with the defaults the shell starts from.
///
/// Every field may be omitted from a TOML file; missing ones keep their
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling rate used for filtering, rate and PSD (Hz)
    pub fs: f64,
    pub filter: FilterPreset,
    pub filter_order: usize,
    /// First sample of the analysis window (inclusive)
    pub start: usize,
    /// End of the analysis window (exclusive)
    pub end: usize,
    pub min_height: f64,
    /// Minimum peak spacing in samples
    pub min_distance: usize,
    pub psd_segment: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fs: DEFAULT_FS,
            filter: FilterPreset::Bandpass,
            filter_order: DEFAULT_ORDER,
            start: 10_000,
            end: 20_000,
            min_height: 500.0,
            min_distance: 250,
            psd_segment: DEFAULT_PSD_SEGMENT,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing analysis config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
        assert_eq!(cfg.fs, 256.0);
        assert_eq!((cfg.start, cfg.end), (10_000, 20_000));
    }

    #[test]
    fn partial_file_overrides_fields() {
        let cfg = AnalysisConfig::from_toml_str(
            r#"
filter = "highpass"
min_height = 0.4
min_distance = 80
"#,
        )
        .unwrap();
        assert_eq!(cfg.filter, FilterPreset::Highpass);
        assert_eq!(cfg.min_height, 0.4);
        assert_eq!(cfg.min_distance, 80);
        assert_eq!(cfg.psd_segment, 1024);
    }

    #[test]
    fn unknown_filter_is_rejected() {
        assert!(AnalysisConfig::from_toml_str("filter = \"notch\"").is_err());
    }
}
