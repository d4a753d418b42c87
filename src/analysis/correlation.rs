// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pearson correlation coefficient.

/// Pearson's r over paired samples.
///
/// Returns exactly `0.0` when the denominator vanishes (constant or empty
/// input). That value is a numeric floor, not a measured correlation.
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|&(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|&(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    let divisor = (variance_x * variance_y).sqrt();
    if divisor == 0.0 {
        return 0.0;
    }

    covariance / divisor
}

/// Pearson's r over two equal-length slices (extra elements are ignored)
pub fn pearson_slices(xs: &[f64], ys: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    pearson(&pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_identical_series() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((pearson_slices(&xs, &xs) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_series() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson_slices(&xs, &ys) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_input_is_zero() {
        let xs = [6.35, 2.23, 3.48, 2.33];
        let zeros = [0.0; 4];
        assert_eq!(pearson_slices(&xs, &zeros), 0.0);
        assert_eq!(pearson_slices(&[3.0; 4], &[3.0; 4]), 0.0);
        assert_eq!(pearson(&[]), 0.0);
        assert!(!pearson_slices(&xs, &zeros).is_nan());
    }

    #[test]
    fn test_bounds_on_random_input() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let pairs: Vec<(f64, f64)> = (0..12)
                .map(|_| (rng.gen_range(0.0..10.0), rng.gen_range(0.0..5000.0)))
                .collect();
            let r = pearson(&pairs);
            assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&r), "r = {}", r);
        }
    }
}
