use anyhow::Context;
use compliancecore::prelude::{ComplianceError, ComplianceResult, DensityEstimator};
use compliancecore::records::MixtureParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workflow::store::read_json;

/// On-disk mixture: either explicit parameters or the raw network output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MixtureFile {
    Params(MixtureParams),
    Flat {
        output: Vec<f64>,
        dims: usize,
        components: usize,
    },
}

/// Density estimator replaying a mixture predicted offline by the trained
/// network for one input signal.
#[derive(Debug, Clone)]
pub struct PrecomputedMixture {
    mixture: MixtureParams,
}

impl PrecomputedMixture {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file: MixtureFile = read_json(path)?;
        let mixture = match file {
            MixtureFile::Params(params) => {
                MixtureParams::new(params.means, params.scales, params.weights)
            }
            MixtureFile::Flat {
                output,
                dims,
                components,
            } => MixtureParams::from_flat(&output, dims, components),
        }
        .with_context(|| format!("validating mixture {}", path.display()))?;
        Ok(Self { mixture })
    }
}

impl DensityEstimator for PrecomputedMixture {
    fn predict(&self, features: &[f64]) -> ComplianceResult<MixtureParams> {
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ComplianceError::Collaborator(
                "scaled features must be finite".into(),
            ));
        }
        Ok(self.mixture.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::store::write_json;
    use approx::assert_relative_eq;

    #[test]
    fn flat_network_output_loads_with_softmax_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixture.json");
        let file = MixtureFile::Flat {
            output: vec![1.0, 2.0, 3.0, 4.0, 0.1, 0.1, 0.2, 0.2, 0.0, 0.0],
            dims: 2,
            components: 2,
        };
        write_json(&path, &file).unwrap();

        let estimator = PrecomputedMixture::load(&path).unwrap();
        let mixture = estimator.predict(&[0.3, -0.2]).unwrap();
        assert_eq!(mixture.components(), 2);
        assert_eq!(mixture.means[1], vec![3.0, 4.0]);
        assert_relative_eq!(mixture.weights[0], 0.5);
    }

    #[test]
    fn explicit_parameters_load_and_refuse_non_finite_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixture.json");
        let mixture = MixtureParams::new(vec![vec![1.0]], vec![vec![0.1]], vec![1.0]).unwrap();
        write_json(&path, &MixtureFile::Params(mixture.clone())).unwrap();

        let estimator = PrecomputedMixture::load(&path).unwrap();
        assert_eq!(estimator.predict(&[0.5]).unwrap(), mixture);
        assert!(estimator.predict(&[f64::NAN]).is_err());
    }
}
