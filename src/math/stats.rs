//! Sample summaries used to report bootstrap and posterior draws.

/// Quantile for sorted data via linear interpolation.
///
/// - `q=0` returns min
/// - `q=1` returns max
/// - empty input returns `NaN`
pub fn quantile_linear_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = pos.ceil() as usize;
    if i == j {
        return sorted[i];
    }
    let t = pos - i as f64;
    (1.0 - t) * sorted[i] + t * sorted[j]
}

pub fn quantile_linear(data: &[f64], q: f64) -> f64 {
    let mut v = data.to_vec();
    v.sort_by(f64::total_cmp);
    quantile_linear_sorted(&v, q)
}

pub fn median(data: &[f64]) -> f64 {
    quantile_linear(data, 0.5)
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample standard deviation (`n − 1` denominator); NaN below two values.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return f64::NAN;
    }
    let m = mean(data);
    let ss: f64 = data.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (data.len() - 1) as f64).sqrt()
}

/// Per-column summary of a set of draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub low_95: f64,
    pub high_95: f64,
}

impl Summary {
    pub fn of(draws: &[f64]) -> Self {
        let mut sorted = draws.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: mean(&sorted),
            median: quantile_linear_sorted(&sorted, 0.5),
            std: std_dev(&sorted),
            low_95: quantile_linear_sorted(&sorted, 0.025),
            high_95: quantile_linear_sorted(&sorted, 0.975),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_linear_sorted_edges() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_linear_sorted(&s, 0.0), 1.0);
        assert_eq!(quantile_linear_sorted(&s, 1.0), 5.0);
        assert_eq!(quantile_linear_sorted(&s, 0.5), 3.0);
        assert_relative_eq!(quantile_linear_sorted(&s, 0.1), 1.4, epsilon = 1e-12);
        assert!(quantile_linear_sorted(&[], 0.5).is_nan());
    }

    #[test]
    fn summary_of_unsorted_draws() {
        let s = Summary::of(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert_relative_eq!(s.std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert!(s.low_95 < s.median && s.median < s.high_95);
    }

    #[test]
    fn std_needs_two_values() {
        assert!(std_dev(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }
}
