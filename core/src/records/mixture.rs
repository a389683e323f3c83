use crate::prelude::{ComplianceError, ComplianceResult};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Gaussian mixture with diagonal covariances over `dims` output dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    pub means: Vec<Vec<f64>>,
    pub scales: Vec<Vec<f64>>,
    /// Normalized component weights.
    pub weights: Vec<f64>,
}

impl MixtureParams {
    pub fn new(
        means: Vec<Vec<f64>>,
        scales: Vec<Vec<f64>>,
        weights: Vec<f64>,
    ) -> ComplianceResult<Self> {
        let components = weights.len();
        if components == 0 || means.len() != components || scales.len() != components {
            return Err(ComplianceError::InvalidInput(
                "mixture needs matching, non-empty means, scales and weights".into(),
            ));
        }
        let dims = means[0].len();
        if means.iter().chain(scales.iter()).any(|row| row.len() != dims) {
            return Err(ComplianceError::InvalidInput(
                "mixture components disagree on dimensionality".into(),
            ));
        }
        if scales.iter().flatten().any(|s| !(*s > 0.0) || !s.is_finite()) {
            return Err(ComplianceError::InvalidInput(
                "mixture scales must be positive and finite".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if weights.iter().any(|w| !(*w >= 0.0)) || !(total > 0.0) || !total.is_finite() {
            return Err(ComplianceError::InvalidInput(
                "mixture weights must be non-negative with a positive sum".into(),
            ));
        }
        let weights = weights.iter().map(|w| w / total).collect();
        Ok(Self {
            means,
            scales,
            weights,
        })
    }

    /// Builds the mixture from a flat network output laid out as
    /// `[means (K·D), scales (K·D), weight logits (K)]`.
    pub fn from_flat(output: &[f64], dims: usize, components: usize) -> ComplianceResult<Self> {
        let expected = 2 * dims * components + components;
        if dims == 0 || output.len() != expected {
            return Err(ComplianceError::InvalidInput(format!(
                "flat mixture output has {} values, expected {expected}",
                output.len()
            )));
        }
        let block = dims * components;
        let rows = |slice: &[f64]| slice.chunks(dims).map(<[f64]>::to_vec).collect::<Vec<_>>();
        let means = rows(&output[..block]);
        let scales = rows(&output[block..2 * block]);
        Self::new(means, scales, softmax(&output[2 * block..]))
    }

    pub fn dims(&self) -> usize {
        self.means.first().map_or(0, Vec::len)
    }

    pub fn components(&self) -> usize {
        self.weights.len()
    }

    /// Weighted mean of the component means.
    pub fn mean(&self) -> Vec<f64> {
        let mut mean = vec![0.0; self.dims()];
        for (weight, component) in self.weights.iter().zip(&self.means) {
            for (acc, value) in mean.iter_mut().zip(component) {
                *acc += weight * value;
            }
        }
        mean
    }

    /// Draws one vector: a component by weight, then each dimension from its
    /// Gaussian.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ComplianceResult<Vec<f64>> {
        let picker = WeightedIndex::new(&self.weights)
            .map_err(|err| ComplianceError::InvalidInput(format!("mixture weights: {err}")))?;
        let component = picker.sample(rng);
        self.means[component]
            .iter()
            .zip(&self.scales[component])
            .map(|(&mean, &scale)| {
                Normal::new(mean, scale)
                    .map(|normal| normal.sample(rng))
                    .map_err(|err| ComplianceError::InvalidInput(format!("mixture scale: {err}")))
            })
            .collect()
    }
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn flat_layout_is_split_into_components() {
        let output = [
            0.0, 1.0, // component 0 means
            5.0, 6.0, // component 1 means
            0.1, 0.1, 0.2, 0.2, // scales
            0.0, 0.0, // equal logits
        ];
        let mixture = MixtureParams::from_flat(&output, 2, 2).unwrap();
        assert_eq!(mixture.components(), 2);
        assert_eq!(mixture.dims(), 2);
        assert_eq!(mixture.means[1], vec![5.0, 6.0]);
        assert_relative_eq!(mixture.weights[0], 0.5);
        assert_relative_eq!(mixture.mean()[0], 2.5);
    }

    #[test]
    fn sampling_follows_dominant_component() {
        let mixture = MixtureParams::new(
            vec![vec![1.0, 2.0], vec![100.0, 100.0]],
            vec![vec![1e-6, 1e-6], vec![1e-6, 1e-6]],
            vec![1.0, 0.0],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let draw = mixture.sample(&mut rng).unwrap();
            assert_relative_eq!(draw[0], 1.0, epsilon = 1e-4);
            assert_relative_eq!(draw[1], 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn wrong_flat_length_is_rejected() {
        assert!(MixtureParams::from_flat(&[0.0; 5], 2, 2).is_err());
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        assert!(MixtureParams::new(vec![vec![0.0]], vec![vec![0.0]], vec![1.0]).is_err());
    }
}
