use crate::math::stats::StatsHelper;
use crate::prelude::{ComplianceError, ComplianceResult};
use ndarray::{Array1, Array2};

pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Bernstein basis polynomial `j` of degree `order` evaluated at `t` in [0, 1].
pub fn basis(t: f64, order: usize, j: usize) -> f64 {
    binomial(order, j) * (1.0 - t).powi((order - j) as i32) * t.powi(j as i32)
}

/// Precomputed Bernstein basis sampled on a normalized depth axis, so that
/// each profile is a single matrix-vector product.
#[derive(Debug, Clone)]
pub struct BernsteinBasis {
    order: usize,
    matrix: Array2<f64>,
}

impl BernsteinBasis {
    /// Basis of degree `order` sampled at `samples` evenly spaced points over
    /// [0, 1]. A profile to depth `max_depth` metres at 1 m resolution uses
    /// `samples == max_depth`.
    pub fn new(order: usize, samples: usize) -> Self {
        let axis = StatsHelper::linspace(0.0, 1.0, samples);
        Self::on_axis(order, &axis)
    }

    pub fn on_axis(order: usize, axis: &[f64]) -> Self {
        let matrix = Array2::from_shape_fn((axis.len(), order + 1), |(i, j)| {
            basis(axis[i], order, j)
        });
        Self { order, matrix }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn evaluate(&self, coefficients: &[f64]) -> ComplianceResult<Vec<f64>> {
        if coefficients.len() != self.order + 1 {
            return Err(ComplianceError::InvalidInput(format!(
                "order {} basis needs {} coefficients, got {}",
                self.order,
                self.order + 1,
                coefficients.len()
            )));
        }
        let coefficients = Array1::from(coefficients.to_vec());
        Ok(self.matrix.dot(&coefficients).to_vec())
    }
}

/// True when no step of `profile` decreases.
pub fn is_non_decreasing(profile: &[f64]) -> bool {
    profile.windows(2).all(|pair| pair[1] >= pair[0])
}
