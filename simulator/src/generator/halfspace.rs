use compliancecore::math::DispersionSolver;
use compliancecore::prelude::{ComplianceError, ComplianceResult, ForwardSolver};
use compliancecore::records::{Layer, LayeredModel};
use std::f64::consts::PI;

/// Depth-weighted half-space approximation of normalized compliance.
///
/// Each layer contributes the half-space compliance `(λ+2μ) / (2μ(λ+μ))`
/// weighted by the decay `exp(-kz)` of the infragravity pressure field over
/// its depth range; the field below the stack is assigned to the last layer.
/// Stands in for a full propagator-matrix solver when generating data
/// offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffectiveHalfSpaceSolver {
    dispersion: DispersionSolver,
}

/// Half-space normalized compliance of one layer [1/Pa].
pub fn layer_compliance(layer: &Layer) -> ComplianceResult<f64> {
    let density = layer.density * 1000.0;
    let (vp, vs) = (layer.vp * 1000.0, layer.vs * 1000.0);
    let mu = density * vs * vs;
    let lambda = density * vp * vp - 2.0 * mu;
    if !(mu > 0.0) || !(lambda + mu > 0.0) {
        return Err(ComplianceError::Collaborator(format!(
            "non-physical layer: vp {} km/s, vs {} km/s, density {} g/cc",
            layer.vp, layer.vs, layer.density
        )));
    }
    Ok((lambda + 2.0 * mu) / (2.0 * mu * (lambda + mu)))
}

impl ForwardSolver for EffectiveHalfSpaceSolver {
    fn compute(
        &self,
        depth: f64,
        frequencies: &[f64],
        model: &LayeredModel,
    ) -> ComplianceResult<Vec<f64>> {
        if model.layers.is_empty() {
            return Err(ComplianceError::Collaborator("empty layered model".into()));
        }
        let per_layer = model
            .layers
            .iter()
            .map(layer_compliance)
            .collect::<ComplianceResult<Vec<_>>>()?;

        let base = model.total_thickness();
        let deepest = per_layer[per_layer.len() - 1];

        frequencies
            .iter()
            .map(|&f| {
                let k = self.dispersion.wavenumber(2.0 * PI * f, depth)?;
                let mut top = 0.0;
                let mut eta = 0.0;
                for (layer, compliance) in model.layers.iter().zip(&per_layer) {
                    let bottom = top + layer.thickness;
                    eta += ((-k * top).exp() - (-k * bottom).exp()) * compliance;
                    top = bottom;
                }
                eta += (-k * base).exp() * deepest;
                Ok(eta)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use compliancecore::records::Petrophysics;

    #[test]
    fn uniform_stack_matches_the_half_space() {
        let model = LayeredModel::from_profile(&[0.5; 100], 1.0, Petrophysics::default());
        let expected = layer_compliance(&model.layers[0]).unwrap();
        let eta = EffectiveHalfSpaceSolver::default()
            .compute(2000.0, &[0.005, 0.01, 0.02], &model)
            .unwrap();
        for value in eta {
            assert_relative_eq!(value, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn compliance_grows_with_frequency_over_soft_sediment() {
        // Soft top layer over stiff basement: longer waves sense deeper, so
        // compliance falls as frequency decreases.
        let mut vs = vec![0.2; 50];
        vs.extend(vec![3.0; 950]);
        let model = LayeredModel::from_profile(&vs, 1.0, Petrophysics::default());
        let eta = EffectiveHalfSpaceSolver::default()
            .compute(2000.0, &[0.004, 0.02], &model)
            .unwrap();
        assert!(eta[0] > 0.0 && eta[1] > eta[0]);
    }

    #[test]
    fn non_physical_layer_is_a_collaborator_error() {
        let model = LayeredModel::from_profile(
            &[7.0],
            1.0,
            Petrophysics::Constant {
                vp: 6.0,
                density: 2.0,
            },
        );
        assert!(matches!(
            EffectiveHalfSpaceSolver::default().compute(2000.0, &[0.01], &model),
            Err(ComplianceError::Collaborator(_))
        ));
    }
}
