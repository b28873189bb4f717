use super::design::FilterCoefficients;
use crate::error::{AnalysisError, AnalysisResult};
use log::debug;

/// Causal single-pass filtering (direct form II transposed, zero initial state).
pub fn lfilter(coeffs: &FilterCoefficients, x: &[f64]) -> AnalysisResult<Vec<f64>> {
    let (b, a) = normalized(coeffs)?;
    let mut state = vec![0.0; b.len() - 1];
    Ok(run_df2t(&b, &a, x, &mut state))
}

/// Initial state for which a unit step input produces a steady output.
pub fn lfilter_zi(coeffs: &FilterCoefficients) -> AnalysisResult<Vec<f64>> {
    let (b, a) = normalized(coeffs)?;
    steady_state(&b, &a)
}

/// Zero-phase forward-backward filtering.
///
/// The input is extended at both ends by odd reflection of
/// [`FilterCoefficients::padlen`] samples; each pass starts from the step
/// steady state scaled to the first sample it sees. The signal must be
/// strictly longer than `padlen`.
pub fn filtfilt(coeffs: &FilterCoefficients, x: &[f64]) -> AnalysisResult<Vec<f64>> {
    let padlen = coeffs.padlen();
    if x.len() <= padlen {
        return Err(AnalysisError::InsufficientLength {
            required: padlen,
            actual: x.len(),
        });
    }
    let (b, a) = normalized(coeffs)?;
    let zi = steady_state(&b, &a)?;

    let ext = odd_extend(x, padlen);
    let mut state: Vec<f64> = zi.iter().map(|z| z * ext[0]).collect();
    let mut y = run_df2t(&b, &a, &ext, &mut state);

    y.reverse();
    let mut state: Vec<f64> = zi.iter().map(|z| z * y[0]).collect();
    let mut y = run_df2t(&b, &a, &y, &mut state);
    y.reverse();

    debug!(
        "filtfilt: {} samples, {} coefficients, padlen {}",
        x.len(),
        b.len(),
        padlen
    );
    Ok(y[padlen..padlen + x.len()].to_vec())
}

/// Pads `b` and `a` to equal length and divides through by `a[0]`.
fn normalized(coeffs: &FilterCoefficients) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
    let a0 = coeffs.a.first().copied().unwrap_or(0.0);
    if coeffs.b.is_empty() || a0 == 0.0 || !a0.is_finite() {
        return Err(AnalysisError::invalid(
            "filter needs a numerator and a non-zero leading denominator coefficient",
        ));
    }
    let n = coeffs.b.len().max(coeffs.a.len());
    let mut b = vec![0.0; n];
    let mut a = vec![0.0; n];
    for (dst, src) in b.iter_mut().zip(&coeffs.b) {
        *dst = src / a0;
    }
    for (dst, src) in a.iter_mut().zip(&coeffs.a) {
        *dst = src / a0;
    }
    Ok((b, a))
}

fn steady_state(b: &[f64], a: &[f64]) -> AnalysisResult<Vec<f64>> {
    let n = b.len();
    let sum_a: f64 = a.iter().sum();
    if sum_a.abs() < f64::EPSILON {
        return Err(AnalysisError::invalid(
            "filter has a pole at z = 1; no step steady state exists",
        ));
    }
    let gain = b.iter().sum::<f64>() / sum_a;
    let mut zi = vec![0.0; n - 1];
    for i in (0..n - 1).rev() {
        let next = zi.get(i + 1).copied().unwrap_or(0.0);
        zi[i] = b[i + 1] - a[i + 1] * gain + next;
    }
    Ok(zi)
}

fn run_df2t(b: &[f64], a: &[f64], x: &[f64], state: &mut [f64]) -> Vec<f64> {
    let order = state.len();
    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + state.first().copied().unwrap_or(0.0);
        for i in 0..order {
            let next = if i + 1 < order { state[i + 1] } else { 0.0 };
            state[i] = b[i + 1] * xn + next - a[i + 1] * yn;
        }
        y.push(yn);
    }
    y
}

fn odd_extend(x: &[f64], padlen: usize) -> Vec<f64> {
    let n = x.len();
    let mut out = Vec::with_capacity(n + 2 * padlen);
    for i in (1..=padlen).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend_from_slice(x);
    for i in 1..=padlen {
        out.push(2.0 * x[n - 1] - x[n - 1 - i]);
    }
    out
}
