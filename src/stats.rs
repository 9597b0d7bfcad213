//! Sample statistics over return series.
//!
//! Sample estimators throughout: standard deviation over n - 1,
//! bias-corrected skewness and excess kurtosis.

/// Observations per year for daily data.
pub const DAYS_PER_YEAR: f64 = 365.0;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation. Returns 0.0 for fewer than two observations.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Scale a daily standard deviation to a yearly one (square-root of time).
pub fn annualize_volatility(daily_std: f64) -> f64 {
    daily_std * DAYS_PER_YEAR.sqrt()
}

/// Adjusted Fisher-Pearson skewness. Returns 0.0 for fewer than three observations.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    if m2 == 0.0 {
        return 0.0;
    }
    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Bias-corrected excess kurtosis. Returns 0.0 for fewer than four observations.
pub fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>() / nf;
    if m2 == 0.0 {
        return 0.0;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    ((nf + 1.0) * g2 + 6.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0))
}

/// Pearson correlation of two equally long series.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let ma = mean(a);
    let mb = mean(b);
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    if va == 0.0 || vb == 0.0 {
        return None;
    }
    Some(cov / (va.sqrt() * vb.sqrt()))
}

/// Share of variance not explained by a linear relationship.
pub fn unexplained_variance(correlation: f64) -> f64 {
    1.0 - correlation.powi(2)
}

/// Element at quantile `alpha` of a slice sorted in descending order.
///
/// The index is `floor(alpha * n)`, clamped to the last element.
pub fn descending_quantile(values: &[f64], alpha: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let idx = ((alpha * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sample_std_uses_n_minus_one() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // population std is 2.0, sample std is sqrt(32 / 7)
        assert_relative_eq!(std_dev(&values), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_symmetric_sample_has_zero_skew() {
        let values = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert_relative_eq!(skewness(&values), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(correlation(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(unexplained_variance(1.0), 0.0);
    }

    #[test]
    fn test_descending_quantile_clamps() {
        let values = [0.1, -0.3, 0.0, -0.1];
        // sorted: 0.1, 0.0, -0.1, -0.3
        assert_eq!(descending_quantile(&values, 0.5), Some(-0.1));
        assert_eq!(descending_quantile(&values, 0.999), Some(-0.3));
        assert_eq!(descending_quantile(&[], 0.5), None);
    }

    #[test]
    fn test_descending_quantile_ignores_order_with_nan() {
        let a = descending_quantile(&[f64::NAN, -0.3, 0.1], 0.5);
        let b = descending_quantile(&[-0.3, 0.1, f64::NAN], 0.5);
        assert_eq!(a, Some(0.1));
        assert_eq!(a, b);
    }
}
