//! Digital Butterworth design.
//!
//! The analog lowpass prototype (cutoff 1 rad/s) is moved to the requested
//! band in zero/pole/gain form, mapped to the z-plane with the bilinear
//! transform and finally expanded into `b`/`a` transfer-function polynomials.
//! Cutoffs are normalised to the Nyquist frequency and pre-warped so the
//! digital response is exactly -3 dB at each cutoff.

use crate::error::{AnalysisError, AnalysisResult};
use log::debug;
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Lower edge of the bandpass preset and cutoff of the highpass preset (Hz).
pub const BASELINE_CUTOFF_HZ: f64 = 0.5;
/// Upper edge of the bandpass preset and cutoff of the lowpass preset (Hz).
pub const NOISE_CUTOFF_HZ: f64 = 40.0;
pub const DEFAULT_ORDER: usize = 4;
/// Highest order `design` accepts.
pub const MAX_ORDER: usize = 32;

// Bilinear transform constant for frequencies normalised to Nyquist (fs = 2).
const BILINEAR_FS2: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Bandpass,
    Lowpass,
    Highpass,
}

/// Requested filter shape. Cutoffs are in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub low_cutoff_hz: Option<f64>,
    pub high_cutoff_hz: Option<f64>,
    pub order: usize,
}

impl FilterSpec {
    pub fn bandpass(low_hz: f64, high_hz: f64, order: usize) -> Self {
        Self {
            kind: FilterKind::Bandpass,
            low_cutoff_hz: Some(low_hz),
            high_cutoff_hz: Some(high_hz),
            order,
        }
    }

    pub fn lowpass(cutoff_hz: f64, order: usize) -> Self {
        Self {
            kind: FilterKind::Lowpass,
            low_cutoff_hz: None,
            high_cutoff_hz: Some(cutoff_hz),
            order,
        }
    }

    pub fn highpass(cutoff_hz: f64, order: usize) -> Self {
        Self {
            kind: FilterKind::Highpass,
            low_cutoff_hz: Some(cutoff_hz),
            high_cutoff_hz: None,
            order,
        }
    }

    pub fn design(&self, fs: f64) -> AnalysisResult<FilterCoefficients> {
        design(
            self.kind,
            self.low_cutoff_hz,
            self.high_cutoff_hz,
            fs,
            self.order,
        )
    }
}

/// The three filter choices offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPreset {
    /// 0.5–40 Hz
    #[default]
    Bandpass,
    /// 40 Hz
    Lowpass,
    /// 0.5 Hz
    Highpass,
}

impl FilterPreset {
    pub fn spec(self, order: usize) -> FilterSpec {
        match self {
            FilterPreset::Bandpass => {
                FilterSpec::bandpass(BASELINE_CUTOFF_HZ, NOISE_CUTOFF_HZ, order)
            }
            FilterPreset::Lowpass => FilterSpec::lowpass(NOISE_CUTOFF_HZ, order),
            FilterPreset::Highpass => FilterSpec::highpass(BASELINE_CUTOFF_HZ, order),
        }
    }
}

/// Transfer-function coefficients, highest power of z⁻¹ last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCoefficients {
    /// Numerator
    pub b: Vec<f64>,
    /// Denominator, `a[0] == 1` for designed filters
    pub a: Vec<f64>,
}

impl FilterCoefficients {
    /// Samples of odd reflection added at each end by zero-phase filtering.
    /// Signals must be strictly longer than this.
    pub fn padlen(&self) -> usize {
        3 * self.b.len().max(self.a.len())
    }

    /// Magnitude of the frequency response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64, fs: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / fs;
        let eval = |coeffs: &[f64]| -> Complex64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, c)| Complex64::from_polar(*c, -w * k as f64))
                .sum()
        };
        let den = eval(&self.a);
        if den.norm() == 0.0 {
            return f64::INFINITY;
        }
        (eval(&self.b) / den).norm()
    }
}

#[derive(Debug, Clone)]
struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

impl Zpk {
    fn degree(&self) -> usize {
        self.poles.len().saturating_sub(self.zeros.len())
    }
}

/// Design a Butterworth filter of the given kind.
///
/// `low` is required for highpass/bandpass, `high` for lowpass/bandpass.
/// Fails when a required cutoff is missing, a cutoff is not strictly between
/// 0 and Nyquist, `low >= high` for bandpass or `order` is outside
/// `1..=MAX_ORDER`.
pub fn design(
    kind: FilterKind,
    low: Option<f64>,
    high: Option<f64>,
    fs: f64,
    order: usize,
) -> AnalysisResult<FilterCoefficients> {
    if !(1..=MAX_ORDER).contains(&order) {
        return Err(AnalysisError::invalid(format!(
            "filter order must be between 1 and {MAX_ORDER}, got {order}"
        )));
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(AnalysisError::invalid(format!(
            "sampling rate must be positive, got {fs}"
        )));
    }
    let nyquist = 0.5 * fs;
    let normalize = |edge: &str, hz: Option<f64>| -> AnalysisResult<f64> {
        let hz = hz.ok_or_else(|| {
            AnalysisError::invalid(format!("{kind:?} filter needs a {edge} cutoff"))
        })?;
        let wn = hz / nyquist;
        if !(wn > 0.0 && wn < 1.0) {
            return Err(AnalysisError::invalid(format!(
                "{edge} cutoff {hz} Hz must lie strictly between 0 and Nyquist ({nyquist} Hz)"
            )));
        }
        Ok(wn)
    };

    let proto = butter_prototype(order);
    let analog = match kind {
        FilterKind::Lowpass => lp_to_lp(&proto, prewarp(normalize("high", high)?)),
        FilterKind::Highpass => lp_to_hp(&proto, prewarp(normalize("low", low)?)),
        FilterKind::Bandpass => {
            let lo = normalize("low", low)?;
            let hi = normalize("high", high)?;
            if lo >= hi {
                return Err(AnalysisError::invalid(format!(
                    "bandpass low cutoff ({} Hz) must be below high cutoff ({} Hz)",
                    lo * nyquist,
                    hi * nyquist
                )));
            }
            let (w1, w2) = (prewarp(lo), prewarp(hi));
            lp_to_bp(&proto, (w1 * w2).sqrt(), w2 - w1)
        }
    };
    let coeffs = zpk_to_tf(&bilinear(&analog));
    debug!(
        "designed {:?} order {} at {} Hz: b={:?} a={:?}",
        kind, order, fs, coeffs.b, coeffs.a
    );
    Ok(coeffs)
}

fn prewarp(wn: f64) -> f64 {
    BILINEAR_FS2 * (PI * wn / 2.0).tan()
}

fn butter_prototype(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - n + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn lp_to_lp(proto: &Zpk, wo: f64) -> Zpk {
    Zpk {
        zeros: proto.zeros.iter().map(|z| *z * wo).collect(),
        poles: proto.poles.iter().map(|p| *p * wo).collect(),
        gain: proto.gain * wo.powi(proto.degree() as i32),
    }
}

fn lp_to_hp(proto: &Zpk, wo: f64) -> Zpk {
    let num: Complex64 = proto.zeros.iter().map(|z| -*z).product();
    let den: Complex64 = proto.poles.iter().map(|p| -*p).product();
    let mut zeros: Vec<Complex64> = proto.zeros.iter().map(|z| wo / *z).collect();
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(proto.degree()));
    Zpk {
        zeros,
        poles: proto.poles.iter().map(|p| wo / *p).collect(),
        gain: proto.gain * (num / den).re,
    }
}

fn lp_to_bp(proto: &Zpk, wo: f64, bw: f64) -> Zpk {
    let split = |roots: &[Complex64]| -> Vec<Complex64> {
        let scaled: Vec<Complex64> = roots.iter().map(|r| *r * (bw / 2.0)).collect();
        let mut out = Vec::with_capacity(roots.len() * 2);
        for &r in &scaled {
            out.push(r + (r * r - wo * wo).sqrt());
        }
        for &r in &scaled {
            out.push(r - (r * r - wo * wo).sqrt());
        }
        out
    };
    let mut zeros = split(&proto.zeros);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(proto.degree()));
    Zpk {
        zeros,
        poles: split(&proto.poles),
        gain: proto.gain * bw.powi(proto.degree() as i32),
    }
}

fn bilinear(analog: &Zpk) -> Zpk {
    let fs2 = Complex64::new(BILINEAR_FS2, 0.0);
    let num: Complex64 = analog.zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = analog.poles.iter().map(|p| fs2 - *p).product();
    let mut zeros: Vec<Complex64> = analog
        .zeros
        .iter()
        .map(|&z| (fs2 + z) / (fs2 - z))
        .collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(analog.degree()));
    Zpk {
        zeros,
        poles: analog
            .poles
            .iter()
            .map(|&p| (fs2 + p) / (fs2 - p))
            .collect(),
        gain: analog.gain * (num / den).re,
    }
}

fn zpk_to_tf(zpk: &Zpk) -> FilterCoefficients {
    FilterCoefficients {
        b: poly(&zpk.zeros).iter().map(|c| c.re * zpk.gain).collect(),
        a: poly(&zpk.poles).iter().map(|c| c.re).collect(),
    }
}

/// Monic polynomial with the given roots, highest power first.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * root;
        }
        coeffs = next;
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 256.0;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual} (tol {tol})"
        );
    }

    #[test]
    fn lowpass_has_unit_dc_gain_and_half_power_at_cutoff() {
        let coeffs = FilterPreset::Lowpass.spec(4).design(FS).unwrap();
        assert_eq!(coeffs.b.len(), 5);
        assert_eq!(coeffs.a.len(), 5);
        assert_close(coeffs.a[0], 1.0, 1e-12);
        assert_close(coeffs.magnitude_at(0.0, FS), 1.0, 1e-9);
        assert_close(coeffs.magnitude_at(40.0, FS), 0.5f64.sqrt(), 1e-6);
        assert!(coeffs.magnitude_at(80.0, FS) < 0.05);
    }

    #[test]
    fn highpass_blocks_dc() {
        let coeffs = FilterPreset::Highpass.spec(4).design(FS).unwrap();
        assert_eq!(coeffs.b.len(), 5);
        assert!(coeffs.magnitude_at(0.0, FS) < 1e-9);
        assert_close(coeffs.magnitude_at(0.5, FS), 0.5f64.sqrt(), 1e-6);
        assert_close(coeffs.magnitude_at(20.0, FS), 1.0, 1e-4);
    }

    #[test]
    fn bandpass_doubles_coefficient_count() {
        let coeffs = FilterPreset::Bandpass.spec(4).design(FS).unwrap();
        assert_eq!(coeffs.b.len(), 9);
        assert_eq!(coeffs.a.len(), 9);
        assert_eq!(coeffs.padlen(), 27);
        assert!(coeffs.magnitude_at(0.0, FS) < 1e-9);
        assert_close(coeffs.magnitude_at(0.5, FS), 0.5f64.sqrt(), 1e-4);
        assert_close(coeffs.magnitude_at(40.0, FS), 0.5f64.sqrt(), 1e-4);
        assert_close(coeffs.magnitude_at(5.0, FS), 1.0, 1e-3);
    }

    #[test]
    fn first_order_lowpass_matches_closed_form() {
        // bilinear RC lowpass: b = [k, k], a = [1, (k' - 1)/(k' + 1)] with k' = tan(pi*wn/2)
        let coeffs = design(FilterKind::Lowpass, None, Some(64.0), FS, 1).unwrap();
        let t = (PI * 0.5 / 2.0).tan();
        let k = t / (1.0 + t);
        assert_close(coeffs.b[0], k, 1e-12);
        assert_close(coeffs.b[1], k, 1e-12);
        assert_close(coeffs.a[1], (t - 1.0) / (t + 1.0), 1e-12);
    }

    #[test]
    fn highest_order_still_designs() {
        let coeffs = FilterSpec::lowpass(40.0, MAX_ORDER).design(FS).unwrap();
        assert_eq!(coeffs.b.len(), MAX_ORDER + 1);
    }

    #[test]
    fn design_is_deterministic() {
        let spec = FilterPreset::Bandpass.spec(DEFAULT_ORDER);
        assert_eq!(spec.design(FS).unwrap(), spec.design(FS).unwrap());
    }

    #[test]
    fn rejects_invalid_parameters() {
        let cases = [
            FilterSpec::lowpass(128.0, 4),
            FilterSpec::lowpass(200.0, 4),
            FilterSpec::highpass(0.0, 4),
            FilterSpec::bandpass(40.0, 0.5, 4),
            FilterSpec::bandpass(10.0, 10.0, 4),
            FilterSpec::lowpass(40.0, 0),
            FilterSpec::lowpass(40.0, MAX_ORDER + 1),
            FilterSpec::bandpass(0.5, 40.0, 1_000_000_000),
            FilterSpec {
                kind: FilterKind::Bandpass,
                low_cutoff_hz: Some(0.5),
                high_cutoff_hz: None,
                order: 4,
            },
        ];
        for spec in cases {
            let err = spec.design(FS).unwrap_err();
            assert!(
                matches!(err, AnalysisError::InvalidParameter(_)),
                "{spec:?} gave {err:?}"
            );
        }
    }
}
