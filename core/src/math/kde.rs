use crate::math::stats::StatsHelper;
use std::f64::consts::PI;

/// One-dimensional Gaussian kernel density estimate with Scott's-rule bandwidth.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Fits the estimate, or `None` when the samples have no spread (or fewer
    /// than two are given) and the kernel would be singular.
    pub fn scott(samples: &[f64]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let spread = StatsHelper::std_ddof(samples, 1);
        if !(spread > 0.0) || !spread.is_finite() {
            return None;
        }
        let factor = (samples.len() as f64).powf(-1.0 / 5.0);
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            samples: sorted,
            bandwidth: spread * factor,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn density(&self, x: f64) -> f64 {
        let norm = 1.0 / (self.samples.len() as f64 * self.bandwidth * (2.0 * PI).sqrt());
        let sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let z = (x - s) / self.bandwidth;
                (-0.5 * z * z).exp()
            })
            .sum();
        norm * sum
    }

    pub fn densities(&self, points: &[f64]) -> Vec<f64> {
        points.iter().map(|&x| self.density(x)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scott_bandwidth_scales_sample_spread() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let kde = GaussianKde::scott(&samples).unwrap();
        let expected = 2.5f64.sqrt() * 5f64.powf(-0.2);
        assert_relative_eq!(kde.bandwidth(), expected, epsilon = 1e-12);
    }

    #[test]
    fn density_integrates_to_one() {
        let kde = GaussianKde::scott(&[0.0, 0.5, 1.0, 3.0]).unwrap();
        let step = 0.01;
        let total: f64 = (-1000..1500).map(|i| kde.density(i as f64 * step) * step).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn identical_samples_have_no_kernel() {
        assert!(GaussianKde::scott(&[2.0, 2.0, 2.0]).is_none());
        assert!(GaussianKde::scott(&[2.0]).is_none());
    }
}
