//! Histogram binning and Pearson correlation.

/// One histogram bin covering `[lower, upper)` (the last bin is closed)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Split `values` into `bins` equal-width bins over `[min, max]`.
///
/// A degenerate range (all values equal) is widened to `value ± 0.5`.
/// Returns an empty vector when there are no values or `bins` is zero.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// Pearson correlation over pairs where both values are present.
///
/// `NaN` when fewer than two complete pairs exist or either side has zero
/// variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Symmetric matrix of pairwise correlations, unit diagonal where defined
pub fn correlation_matrix(columns: &[&[Option<f64>]]) -> Vec<Vec<f64>> {
    let k = columns.len();
    let mut m = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(columns[i], columns[j]);
            m[i][j] = r;
            m[j][i] = r;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn equal_width_bins_with_inclusive_last_edge() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[3].upper, 4.0);
        let counts: Vec<u64> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn constant_values_widen_range() {
        let bins = histogram(&[2.0, 2.0, 2.0], 2);
        assert_eq!(bins[0].lower, 1.5);
        assert_eq!(bins[1].upper, 2.5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 3);
    }

    #[test]
    fn empty_input_has_no_bins() {
        assert!(histogram(&[], 10).is_empty());
        assert!(histogram(&[1.0], 0).is_empty());
    }

    #[test]
    fn perfect_correlations() {
        let x = some(&[1.0, 2.0, 3.0, 4.0]);
        let up = some(&[2.0, 4.0, 6.0, 8.0]);
        let down = some(&[8.0, 6.0, 4.0, 2.0]);
        assert!((pearson(&x, &up) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &down) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_pairs_are_skipped() {
        let x = vec![Some(1.0), None, Some(2.0), Some(3.0)];
        let y = vec![Some(10.0), Some(99.0), Some(20.0), Some(30.0)];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_correlation_is_nan() {
        let x = some(&[1.0, 2.0, 3.0]);
        let flat = some(&[5.0, 5.0, 5.0]);
        assert!(pearson(&x, &flat).is_nan());
        assert!(pearson(&[Some(1.0)], &[Some(2.0)]).is_nan());
    }

    #[test]
    fn matrix_is_symmetric() {
        let a = some(&[1.0, 2.0, 3.0]);
        let b = some(&[3.0, 1.0, 2.0]);
        let m = correlation_matrix(&[&a, &b]);
        assert_eq!(m[0][1], m[1][0]);
        assert!((m[0][0] - 1.0).abs() < 1e-12);
    }
}
