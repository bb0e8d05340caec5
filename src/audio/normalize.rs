/// Output used for every entry when the percentile range collapses.
pub const DEGENERATE_LEVEL: f32 = 0.5;

/// Linear-interpolated percentile (`p` in 0..=100) of an ascending, non-empty slice.
pub fn percentile(sorted: &[f32], p: f32) -> f32 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) as f64 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Log-compress then rescale so the `p_min` percentile maps to 0 and
/// `p_max` to 1, clipping to [0, 1].
///
/// Constant (or near-constant) input has no spread to rescale; every
/// entry then becomes [`DEGENERATE_LEVEL`].
pub fn percentile_normalize(values: &[f32], p_min: f32, p_max: f32) -> Vec<f32> {
    if values.is_empty() {
        return Vec::new();
    }

    let compressed: Vec<f32> = values.iter().map(|v| v.max(0.0).ln_1p()).collect();
    let mut sorted = compressed.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let lo = percentile(&sorted, p_min);
    let hi = percentile(&sorted, p_max);
    let spread = hi - lo;

    if !(spread > f32::EPSILON) {
        log::debug!(
            "Degenerate percentile range ({:.6}..{:.6}), using constant {}",
            lo,
            hi,
            DEGENERATE_LEVEL
        );
        return vec![DEGENERATE_LEVEL; values.len()];
    }

    compressed
        .iter()
        .map(|v| ((v - lo) / spread).clamp(0.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert!((percentile(&v, 20.0) - 1.8).abs() < 1e-6);
    }

    #[test]
    fn output_is_clipped_to_unit_range() {
        let values: Vec<f32> = (0..100).map(|i| i as f32 * 0.37).collect();
        let out = percentile_normalize(&values, 20.0, 80.0);
        assert_eq!(out.len(), values.len());
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(out[0], 0.0);
        assert_eq!(out[99], 1.0);
    }

    #[test]
    fn percentile_bounds_map_to_endpoints() {
        let values: Vec<f32> = (1..=11).map(|i| i as f32).collect();
        // p_min / p_max fall exactly on the 3rd and 9th entries
        let out = percentile_normalize(&values, 20.0, 80.0);
        assert!(out[2].abs() < 1e-6);
        assert!((out[8] - 1.0).abs() < 1e-6);
        assert!(out[5] > 0.0 && out[5] < 1.0);
        // everything below p_min clips to 0, above p_max to 1
        assert_eq!(&out[..2], &[0.0, 0.0]);
        assert_eq!(&out[9..], &[1.0, 1.0]);
    }

    #[test]
    fn preserves_order() {
        let values = [0.01, 0.5, 0.02, 0.9, 0.3, 0.04, 0.7];
        let out = percentile_normalize(&values, 20.0, 80.0);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] < values[j] {
                    assert!(out[i] <= out[j]);
                }
            }
        }
    }

    #[test]
    fn constant_input_is_degenerate_not_nan() {
        let out = percentile_normalize(&[0.2; 16], 20.0, 80.0);
        assert!(out.iter().all(|&v| v == DEGENERATE_LEVEL));

        let zeros = percentile_normalize(&[0.0; 4], 20.0, 80.0);
        assert!(zeros.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn empty_input() {
        assert!(percentile_normalize(&[], 20.0, 80.0).is_empty());
    }
}
