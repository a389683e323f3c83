use crate::math::kde::GaussianKde;
use crate::prelude::{ComplianceError, ComplianceResult};
use ndarray::ArrayView2;

/// Pointwise KDE-smoothed percentile bounds over a profile ensemble.
#[derive(Debug, Clone, Copy)]
pub struct PercentileEstimator {
    lower: f64,
    upper: f64,
}

impl Default for PercentileEstimator {
    fn default() -> Self {
        Self {
            lower: 0.025,
            upper: 0.975,
        }
    }
}

impl PercentileEstimator {
    pub fn new(lower: f64, upper: f64) -> ComplianceResult<Self> {
        if !(0.0..=1.0).contains(&lower) || !(lower..=1.0).contains(&upper) {
            return Err(ComplianceError::InvalidInput(format!(
                "percentiles must satisfy 0 <= {lower} <= {upper} <= 1"
            )));
        }
        Ok(Self { lower, upper })
    }

    /// `ensemble` holds one sampled profile per row. Returns the lower and
    /// upper bound at every column (depth index).
    pub fn bounds(&self, ensemble: ArrayView2<f64>) -> ComplianceResult<(Vec<f64>, Vec<f64>)> {
        if ensemble.nrows() == 0 {
            return Err(ComplianceError::InvalidInput("empty ensemble".into()));
        }
        let mut lower = Vec::with_capacity(ensemble.ncols());
        let mut upper = Vec::with_capacity(ensemble.ncols());
        for column in ensemble.columns() {
            let mut sorted = column.to_vec();
            sorted.sort_by(f64::total_cmp);
            let (lo, hi) = self.column_bounds(&sorted);
            lower.push(lo);
            upper.push(hi);
        }
        Ok((lower, upper))
    }

    fn column_bounds(&self, sorted: &[f64]) -> (f64, f64) {
        let kde = match GaussianKde::scott(sorted) {
            Some(kde) => kde,
            // Identical samples: the distribution is a point mass.
            None => return (sorted[0], sorted[0]),
        };
        let density = kde.densities(sorted);
        let total: f64 = density.iter().sum();
        let mut cumulative = Vec::with_capacity(density.len());
        let mut running = 0.0;
        for d in density {
            running += d / total;
            cumulative.push(running);
        }
        (
            first_reaching(sorted, &cumulative, self.lower),
            first_reaching(sorted, &cumulative, self.upper),
        )
    }
}

fn first_reaching(sorted: &[f64], cumulative: &[f64], q: f64) -> f64 {
    cumulative
        .iter()
        .position(|&mass| mass >= q)
        .map_or(sorted[sorted.len() - 1], |idx| sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn identical_samples_bound_to_their_value() {
        let ensemble = Array2::from_elem((50, 3), 2.5);
        let (lower, upper) = PercentileEstimator::default()
            .bounds(ensemble.view())
            .unwrap();
        assert_eq!(lower, vec![2.5; 3]);
        assert_eq!(upper, vec![2.5; 3]);
    }

    #[test]
    fn bounds_bracket_the_bulk_of_the_ensemble() {
        let n = 1000;
        let ensemble =
            Array2::from_shape_fn((n, 2), |(i, j)| i as f64 / (n - 1) as f64 + j as f64);
        let (lower, upper) = PercentileEstimator::default()
            .bounds(ensemble.view())
            .unwrap();
        for j in 0..2 {
            assert!(lower[j] < upper[j]);
            assert!(lower[j] >= j as f64 && lower[j] < j as f64 + 0.1);
            assert!(upper[j] <= j as f64 + 1.0 && upper[j] > j as f64 + 0.9);
        }
    }

    #[test]
    fn single_sample_is_its_own_bound() {
        let ensemble = Array2::from_shape_vec((1, 2), vec![1.0, 4.0]).unwrap();
        let (lower, upper) = PercentileEstimator::default()
            .bounds(ensemble.view())
            .unwrap();
        assert_eq!(lower, vec![1.0, 4.0]);
        assert_eq!(upper, vec![1.0, 4.0]);
    }

    #[test]
    fn inverted_percentiles_are_rejected() {
        assert!(PercentileEstimator::new(0.9, 0.1).is_err());
    }
}
