//! Correlation statistics on paired samples.

use statrs::function::beta::beta_reg;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// True if all the values are equal (or if there are none).
pub fn is_constant(xs: &[f64]) -> bool {
    match xs.first() {
        Some(x0) => xs.iter().all(|x| x == x0),
        None => true,
    }
}

/// Pearson product-moment correlation coefficient.
///
/// Returns None when the samples do not have the same length, have fewer
/// than two elements or when one of them has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    let r = sxy / (sxx * syy).sqrt();
    Some(r.clamp(-1.0, 1.0))
}

/// Ranks starting at 1. Tied values get the average of the ranks they span.
pub fn average_ranks(xs: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|a, b| xs[*a].total_cmp(&xs[*b]));
    let mut ranks = vec![0.0; xs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && xs[order[j + 1]] == xs[order[i]] {
            j += 1;
        }
        // Positions i..=j (0-based) share the ranks i+1..=j+1.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman's rank correlation coefficient.
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

/// Two-tailed p-value of a correlation coefficient computed on n pairs.
///
/// Uses the t statistic t = r * sqrt((n - 2) / (1 - r^2)) with n - 2 degrees
/// of freedom, expressed through the regularized incomplete beta function:
/// p = I_{1 - r^2}((n - 2) / 2, 1 / 2).
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return f64::NAN;
    }
    let df = (n - 2) as f64;
    let x = (1.0 - r * r).clamp(0.0, 1.0);
    beta_reg(df / 2.0, 0.5, x)
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];
    const Y: [f64; 5] = [2.0, 4.0, 5.0, 4.0, 5.0];

    #[test]
    fn pearson_textbook_example() {
        let r = pearson(&X, &Y).unwrap();
        assert!((r - 0.7745966692414834).abs() < 1e-12, "r = {}", r);
        let p = correlation_p_value(r, 5);
        assert!((p - 0.12402706265755).abs() < 1e-8, "p = {}", p);
    }

    #[test]
    fn spearman_with_ties() {
        assert_eq!(average_ranks(&Y), vec![1.0, 2.5, 4.5, 2.5, 4.5]);
        let rho = spearman(&X, &Y).unwrap();
        assert!((rho - 0.7378647873726218).abs() < 1e-12, "rho = {}", rho);
        let p = correlation_p_value(rho, 5);
        assert!((p - 0.15461852312845).abs() < 1e-8, "p = {}", p);
    }

    #[test]
    fn perfect_correlations() {
        let ys: Vec<f64> = X.iter().map(|x| 3.0 * x - 1.0).collect();
        assert!((pearson(&X, &ys).unwrap() - 1.0).abs() < 1e-12);
        let neg: Vec<f64> = X.iter().map(|x| -0.5 * x).collect();
        assert!((pearson(&X, &neg).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(correlation_p_value(1.0, 5), 0.0);
    }

    #[test]
    fn zero_correlation_is_not_significant() {
        assert!((correlation_p_value(0.0, 40) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(pearson(&X, &[1.0, 1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&X, &Y[..4]), None);
        assert!(correlation_p_value(0.5, 2).is_nan());
        assert!(is_constant(&[0.0, 0.0, 0.0]));
        assert!(!is_constant(&X));
    }

    #[test]
    fn p_value_decreases_with_sample_size() {
        let p_small = correlation_p_value(0.3, 20);
        let p_large = correlation_p_value(0.3, 200);
        assert!(p_large < p_small);
        assert!(p_small > 0.05);
        assert!(p_large < 0.05);
    }
}
