use crate::math::bernstein::is_non_decreasing;
use crate::prelude::{ComplianceError, ComplianceResult};
use serde::{Deserialize, Serialize};

/// Relation used to derive Vp [km/s] and density [g/cm³] from Vs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Petrophysics {
    Constant { vp: f64, density: f64 },
    /// Vp = 1.87·Vs (Hyndman) with ρ = 1.85 + 0.165·Vp (Christensen & Shaw).
    Hyndman,
}

impl Default for Petrophysics {
    fn default() -> Self {
        Petrophysics::Constant {
            vp: 6.0,
            density: 2.0,
        }
    }
}

impl Petrophysics {
    /// `(vp, density)` for a layer with shear velocity `vs`.
    pub fn derive(&self, vs: f64) -> (f64, f64) {
        match *self {
            Petrophysics::Constant { vp, density } => (vp, density),
            Petrophysics::Hyndman => {
                let vp = 1.87 * vs;
                (vp, 1.85 + 0.165 * vp)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub thickness: f64,
    pub density: f64,
    pub vp: f64,
    pub vs: f64,
}

/// Stack of elastic layers below the seafloor, top first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredModel {
    pub layers: Vec<Layer>,
}

impl LayeredModel {
    /// One layer of `thickness` per Vs sample.
    pub fn from_profile(vs: &[f64], thickness: f64, petrophysics: Petrophysics) -> Self {
        let layers = vs
            .iter()
            .map(|&vs| {
                let (vp, density) = petrophysics.derive(vs);
                Layer {
                    thickness,
                    density,
                    vp,
                    vs,
                }
            })
            .collect();
        Self { layers }
    }

    pub fn total_thickness(&self) -> f64 {
        self.layers.iter().map(|layer| layer.thickness).sum()
    }
}

/// A synthetic Earth model: a monotonic Vs(z) profile and the Bernstein
/// coefficients that generated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationProfile {
    /// Shear velocity at 1 m resolution [km/s].
    pub vs: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub max_depth_m: usize,
    pub inversion_frequencies: Vec<f64>,
    pub station_depth: f64,
    pub dim_x: usize,
    pub dim_y: usize,
}

impl StationProfile {
    pub fn order(&self) -> usize {
        self.dim_y.saturating_sub(1)
    }

    pub fn validate(&self) -> ComplianceResult<()> {
        if self.vs.len() != self.max_depth_m
            || self.coefficients.len() != self.dim_y
            || self.inversion_frequencies.len() != self.dim_x
        {
            return Err(ComplianceError::InvalidInput(
                "profile dimensions disagree with its metadata".into(),
            ));
        }
        if !is_non_decreasing(&self.vs) {
            return Err(ComplianceError::InvalidInput(
                "profile decreases with depth".into(),
            ));
        }
        Ok(())
    }
}

/// A profile paired with its noisy, coherence-weighted compliance signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub profile: StationProfile,
    pub signal: Vec<f64>,
}

impl TrainingExample {
    pub fn validate(&self) -> ComplianceResult<()> {
        self.profile.validate()?;
        if self.signal.len() != self.profile.dim_x {
            return Err(ComplianceError::InvalidInput(format!(
                "signal has {} values, expected {}",
                self.signal.len(),
                self.profile.dim_x
            )));
        }
        if self.signal.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(ComplianceError::InvalidInput(
                "signal must be finite and strictly positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_petrophysics_ignores_vs() {
        let model = LayeredModel::from_profile(&[0.1, 0.5, 1.0], 1.0, Petrophysics::default());
        assert_eq!(model.layers.len(), 3);
        assert!(model.layers.iter().all(|l| l.vp == 6.0 && l.density == 2.0));
        assert_relative_eq!(model.total_thickness(), 3.0);
    }

    #[test]
    fn hyndman_scales_vp_and_density() {
        let (vp, density) = Petrophysics::Hyndman.derive(1.0);
        assert_relative_eq!(vp, 1.87);
        assert_relative_eq!(density, 1.85 + 0.165 * 1.87);
    }

    #[test]
    fn decreasing_profile_fails_validation() {
        let profile = StationProfile {
            vs: vec![1.0, 0.9],
            coefficients: vec![1.0, 0.9],
            max_depth_m: 2,
            inversion_frequencies: vec![0.01],
            station_depth: 1000.0,
            dim_x: 1,
            dim_y: 2,
        };
        assert!(profile.validate().is_err());
    }
}
