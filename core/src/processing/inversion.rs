use crate::math::bernstein::BernsteinBasis;
use crate::prelude::{ComplianceError, ComplianceResult, DensityEstimator};
use crate::processing::percentile::PercentileEstimator;
use crate::records::{FeatureScaling, TrainingExample};
use crate::telemetry::log::LogManager;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Scaled inputs and coefficient targets handed to the density-estimator trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMatrices {
    pub inputs: Array2<f64>,
    pub targets: Array2<f64>,
    pub scaling: FeatureScaling,
}

impl TrainingMatrices {
    /// Stacks the signals (X) and coefficients (Y) and fits the feature scaling on X.
    pub fn prepare(examples: &[TrainingExample]) -> ComplianceResult<Self> {
        let first = examples.first().ok_or_else(|| {
            ComplianceError::InvalidInput("no training examples to prepare".into())
        })?;
        let (dim_x, dim_y) = (first.signal.len(), first.profile.coefficients.len());
        let mut signals = Array2::zeros((examples.len(), dim_x));
        let mut targets = Array2::zeros((examples.len(), dim_y));
        for (row, example) in examples.iter().enumerate() {
            example.validate()?;
            if example.signal.len() != dim_x || example.profile.coefficients.len() != dim_y {
                return Err(ComplianceError::InvalidInput(format!(
                    "example {row} has shape ({}, {}), expected ({dim_x}, {dim_y})",
                    example.signal.len(),
                    example.profile.coefficients.len()
                )));
            }
            for (dst, src) in signals.row_mut(row).iter_mut().zip(&example.signal) {
                *dst = *src;
            }
            for (dst, src) in targets
                .row_mut(row)
                .iter_mut()
                .zip(&example.profile.coefficients)
            {
                *dst = *src;
            }
        }
        let (inputs, scaling) = FeatureScaling::fit(&signals)?;
        Ok(Self {
            inputs,
            targets,
            scaling,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InversionConfig {
    /// Coefficient vectors drawn from the predicted mixture.
    pub samples: usize,
    pub seed: u64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionResult {
    /// One sampled coefficient vector per row.
    pub coefficients: Array2<f64>,
    pub mean_coefficients: Vec<f64>,
    /// Profile of the mean coefficients [km/s].
    pub mean_profile: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Turns one measured signal into a bounded velocity profile estimate.
pub struct Inverter {
    config: InversionConfig,
    percentiles: PercentileEstimator,
    logger: LogManager,
}

impl Inverter {
    pub fn new(config: InversionConfig) -> Self {
        Self {
            config,
            percentiles: PercentileEstimator::default(),
            logger: LogManager::for_stage("inversion"),
        }
    }

    pub fn invert<E: DensityEstimator + ?Sized>(
        &self,
        estimator: &E,
        scaling: &FeatureScaling,
        signal: &[f64],
        basis: &BernsteinBasis,
    ) -> ComplianceResult<InversionResult> {
        if self.config.samples == 0 {
            return Err(ComplianceError::InvalidInput(
                "inversion needs at least one sample".into(),
            ));
        }
        let features = scaling.apply(signal)?;
        let mixture = estimator.predict(&features)?;
        let dims = basis.order() + 1;
        if mixture.dims() != dims {
            return Err(ComplianceError::Collaborator(format!(
                "mixture predicts {} coefficients, basis expects {dims}",
                mixture.dims()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut coefficients = Array2::zeros((self.config.samples, dims));
        let mut profiles = Array2::zeros((self.config.samples, basis.samples()));
        for row in 0..self.config.samples {
            let draw = mixture.sample(&mut rng)?;
            let profile = basis.evaluate(&draw)?;
            for (dst, src) in coefficients.row_mut(row).iter_mut().zip(&draw) {
                *dst = *src;
            }
            for (dst, src) in profiles.row_mut(row).iter_mut().zip(&profile) {
                *dst = *src;
            }
        }

        let mean_coefficients = coefficients
            .mean_axis(Axis(0))
            .map(|mean| mean.to_vec())
            .unwrap_or_default();
        let mean_profile = basis.evaluate(&mean_coefficients)?;
        let (lower, upper) = self.percentiles.bounds(profiles.view())?;

        self.logger.record(&format!(
            "{} samples from a {}-component mixture",
            self.config.samples,
            mixture.components()
        ));

        Ok(InversionResult {
            coefficients,
            mean_coefficients,
            mean_profile,
            lower,
            upper,
        })
    }
}

impl Default for Inverter {
    fn default() -> Self {
        Self::new(InversionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MixtureParams, StationProfile};
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    struct FixedMixture {
        mixture: MixtureParams,
        seen: RefCell<Vec<f64>>,
    }

    impl DensityEstimator for FixedMixture {
        fn predict(&self, features: &[f64]) -> ComplianceResult<MixtureParams> {
            self.seen.replace(features.to_vec());
            Ok(self.mixture.clone())
        }
    }

    fn example(signal: [f64; 2], coefficients: [f64; 2]) -> TrainingExample {
        TrainingExample {
            profile: StationProfile {
                vs: vec![coefficients[0], coefficients[1]],
                coefficients: coefficients.to_vec(),
                max_depth_m: 2,
                inversion_frequencies: vec![0.01, 0.02],
                station_depth: 1000.0,
                dim_x: 2,
                dim_y: 2,
            },
            signal: signal.to_vec(),
        }
    }

    #[test]
    fn prepare_stacks_and_scales_examples() {
        let examples = vec![
            example([1e-11, 1e-10], [0.5, 1.0]),
            example([1e-9, 1e-10], [1.0, 2.0]),
        ];
        let matrices = TrainingMatrices::prepare(&examples).unwrap();
        assert_eq!(matrices.inputs.dim(), (2, 2));
        assert_eq!(matrices.targets[[1, 1]], 2.0);
        assert_relative_eq!(matrices.scaling.mean[0], -10.0, epsilon = 1e-12);
        assert_relative_eq!(matrices.inputs[[0, 0]], -1.0, epsilon = 1e-12);
        // Constant feature is centred, not scaled.
        assert!(matrices.inputs[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn prepare_rejects_empty_input() {
        assert!(TrainingMatrices::prepare(&[]).is_err());
    }

    #[test]
    fn narrow_mixture_recovers_its_profile() {
        let mixture =
            MixtureParams::new(vec![vec![1.0, 1.0, 2.0]], vec![vec![1e-6; 3]], vec![1.0]).unwrap();
        let estimator = FixedMixture {
            mixture,
            seen: RefCell::new(Vec::new()),
        };
        let scaling = FeatureScaling {
            mean: vec![-10.0],
            std: vec![1.0],
        };
        let basis = BernsteinBasis::new(2, 50);
        let inverter = Inverter::new(InversionConfig {
            samples: 200,
            seed: 3,
        });
        let result = inverter.invert(&estimator, &scaling, &[1e-9], &basis).unwrap();

        assert_relative_eq!(estimator.seen.borrow()[0], 1.0, epsilon = 1e-12);
        assert_eq!(result.coefficients.dim(), (200, 3));
        assert_eq!(result.mean_profile.len(), 50);
        assert_relative_eq!(result.mean_profile[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(result.mean_profile[49], 2.0, epsilon = 1e-5);
        for i in 0..50 {
            assert!(result.lower[i] <= result.upper[i]);
            assert!((result.lower[i] - result.mean_profile[i]).abs() < 1e-4);
            assert!((result.upper[i] - result.mean_profile[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn mixture_dimension_must_match_basis() {
        let estimator = FixedMixture {
            mixture: MixtureParams::new(vec![vec![1.0]], vec![vec![0.1]], vec![1.0]).unwrap(),
            seen: RefCell::new(Vec::new()),
        };
        let scaling = FeatureScaling {
            mean: vec![0.0],
            std: vec![1.0],
        };
        let basis = BernsteinBasis::new(3, 10);
        let result = Inverter::default().invert(&estimator, &scaling, &[1.0], &basis);
        assert!(matches!(result, Err(ComplianceError::Collaborator(_))));
    }
}
