use crate::signal::Events;
use std::cmp::Ordering;

/// Find local maxima in `segment` that reach `min_height` and are at least
/// `min_distance` samples apart.
///
/// A peak is a sample strictly greater than both neighbours, or the middle of
/// a flat plateau whose edges both fall off. The first and last samples are
/// never peaks. When candidates crowd each other the taller one wins (the
/// earlier one on equal height) and every candidate closer than
/// `min_distance` to it is dropped. `min_distance <= 1` imposes no spacing.
///
/// Indices are relative to the start of `segment`, ascending. An empty result
/// means no peak qualified; it is not an error.
pub fn find_peaks(segment: &[f64], min_height: f64, min_distance: usize) -> Events {
    let mut candidates = local_maxima(segment);
    candidates.retain(|&i| segment[i] >= min_height);
    if min_distance > 1 && candidates.len() > 1 {
        candidates = select_by_distance(segment, &candidates, min_distance);
    }
    Events::from_indices(candidates)
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            // walk across a possible plateau
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(x: &[f64], peaks: &[usize], min_distance: usize) -> Vec<usize> {
    // visiting order: tallest first, earlier index on ties
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&l, &r| {
        x[peaks[r]]
            .partial_cmp(&x[peaks[l]])
            .unwrap_or(Ordering::Equal)
            .then(peaks[l].cmp(&peaks[r]))
    });

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < min_distance {
            k -= 1;
            keep[k] = false;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}
