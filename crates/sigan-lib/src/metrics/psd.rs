use crate::error::{AnalysisError, AnalysisResult};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Segment length used for the ECG spectrum.
pub const DEFAULT_PSD_SEGMENT: usize = 1024;

/// One-sided power spectral density, `[frequency_hz, power]` pairs with
/// ascending frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralEstimate {
    pub fs: f64,
    pub segment_length: usize,
    pub segments: usize,
    pub points: Vec<[f64; 2]>,
}

impl SpectralEstimate {
    pub fn frequencies(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[0])
    }

    pub fn powers(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[1])
    }

    /// Frequency bin holding the most power, ignoring DC.
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.points
            .iter()
            .skip(1)
            .max_by(|l, r| l[1].total_cmp(&r[1]))
            .map(|p| p[0])
    }
}

/// Welch's averaged periodogram.
///
/// Segments of `segment_length` samples overlap by half; each is
/// mean-detrended and Hann-windowed before the FFT. Powers are density-scaled
/// (units²/Hz) and one-sided.
pub fn estimate_psd(
    signal: &[f64],
    fs: f64,
    segment_length: usize,
) -> AnalysisResult<SpectralEstimate> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(AnalysisError::invalid(format!(
            "sampling rate must be positive, got {fs}"
        )));
    }
    if segment_length < 2 {
        return Err(AnalysisError::invalid(format!(
            "segment length must be at least 2, got {segment_length}"
        )));
    }
    if segment_length > signal.len() {
        return Err(AnalysisError::invalid(format!(
            "segment length {segment_length} exceeds signal length {}",
            signal.len()
        )));
    }

    let window = hann(segment_length);
    let win_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * win_power);
    let step = segment_length - segment_length / 2;

    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(segment_length);
    let mut spectrum = r2c.make_output_vec();
    let mut powers = vec![0.0; spectrum.len()];
    let mut pos = 0;
    let mut segments = 0;
    while pos + segment_length <= signal.len() {
        let slice = &signal[pos..pos + segment_length];
        let mean = slice.iter().sum::<f64>() / segment_length as f64;
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(window.iter())
            .map(|(x, w)| (x - mean) * w)
            .collect();
        r2c.process(&mut frame, &mut spectrum)
            .map_err(|e| AnalysisError::invalid(format!("FFT failed: {e}")))?;
        for (k, val) in spectrum.iter().enumerate() {
            let one_sided = if k == 0 || (segment_length % 2 == 0 && k == segment_length / 2) {
                1.0
            } else {
                2.0
            };
            powers[k] += one_sided * val.norm_sqr() * scale;
        }
        segments += 1;
        pos += step;
    }
    for p in powers.iter_mut() {
        *p /= segments as f64;
    }

    let points = powers
        .into_iter()
        .enumerate()
        .map(|(k, p)| [k as f64 * fs / segment_length as f64, p])
        .collect();
    Ok(SpectralEstimate {
        fs,
        segment_length,
        segments,
        points,
    })
}

/// Periodic Hann window.
fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, rel_tol: f64) {
        let tol = expected.abs().max(1.0) * rel_tol;
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    #[test]
    fn frequency_axis_is_one_sided_and_ascending() {
        let x: Vec<f64> = (0..4096).map(|i| (i as f64 * 0.1).sin()).collect();
        let psd = estimate_psd(&x, 256.0, 1024).unwrap();
        assert_eq!(psd.points.len(), 1024 / 2 + 1);
        let freqs: Vec<f64> = psd.frequencies().collect();
        assert_eq!(freqs[0], 0.0);
        assert!(freqs.windows(2).all(|w| w[1] > w[0]));
        assert_close(*freqs.last().unwrap(), 128.0, 1e-12);
        assert!(psd.powers().all(|p| p >= 0.0));
        // 50% overlap: (4096 - 1024) / 512 + 1
        assert_eq!(psd.segments, 7);
    }

    #[test]
    fn peak_sits_at_the_tone() {
        let fs = 256.0;
        let x: Vec<f64> = (0..8192)
            .map(|i| (2.0 * PI * 12.0 * i as f64 / fs).sin())
            .collect();
        let psd = estimate_psd(&x, fs, 1024).unwrap();
        assert_close(psd.dominant_frequency().unwrap(), 12.0, 1e-9);
    }

    #[test]
    fn density_integrates_to_variance() {
        // Parseval: sum(P) * df ~= mean-square of a zero-mean tone (0.5 for unit amplitude)
        let fs = 256.0;
        let x: Vec<f64> = (0..8192)
            .map(|i| (2.0 * PI * 20.0 * i as f64 / fs).sin())
            .collect();
        let psd = estimate_psd(&x, fs, 512).unwrap();
        let df = fs / 512.0;
        let total: f64 = psd.powers().sum::<f64>() * df;
        assert_close(total, 0.5, 1e-3);
    }

    #[test]
    fn rejects_bad_segment_lengths() {
        let x = vec![0.0; 100];
        assert!(matches!(
            estimate_psd(&x, 256.0, 101),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(matches!(
            estimate_psd(&x, 256.0, 1),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(estimate_psd(&x, 256.0, 100).is_ok());
    }
}
