use crate::prelude::{ComplianceError, ComplianceResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardization of log10-transformed compliance signals.
///
/// Fitted once on the training signals and persisted, so that measured
/// signals reach the density estimator scaled exactly like the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaling {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl FeatureScaling {
    /// Fits the scaling on `signals` (one row per example) and returns the
    /// scaled matrix alongside it.
    pub fn fit(signals: &Array2<f64>) -> ComplianceResult<(Array2<f64>, Self)> {
        if signals.nrows() == 0 {
            return Err(ComplianceError::InvalidInput(
                "cannot fit feature scaling on zero examples".into(),
            ));
        }
        let logged = log10_checked(signals)?;
        let mean: Array1<f64> = logged
            .mean_axis(Axis(0))
            .ok_or_else(|| ComplianceError::InvalidInput("empty signal matrix".into()))?;
        let std = logged.std_axis(Axis(0), 0.0).mapv(guard_zero);
        let scaled = (&logged - &mean) / &std;
        Ok((
            scaled,
            Self {
                mean: mean.to_vec(),
                std: std.to_vec(),
            },
        ))
    }

    /// Scales a single measured signal.
    pub fn apply(&self, signal: &[f64]) -> ComplianceResult<Vec<f64>> {
        if signal.len() != self.mean.len() {
            return Err(ComplianceError::InvalidInput(format!(
                "signal has {} features, scaling expects {}",
                signal.len(),
                self.mean.len()
            )));
        }
        signal
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(&value, (&mean, &std))| {
                if value > 0.0 {
                    Ok((value.log10() - mean) / guard_zero(std))
                } else {
                    Err(ComplianceError::InvalidInput(format!(
                        "signal value {value} has no logarithm"
                    )))
                }
            })
            .collect()
    }
}

fn log10_checked(signals: &Array2<f64>) -> ComplianceResult<Array2<f64>> {
    if signals.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
        return Err(ComplianceError::InvalidInput(
            "signals must be finite and strictly positive before log scaling".into(),
        ));
    }
    Ok(signals.mapv(f64::log10))
}

// A constant feature carries no information; leave it centred but unscaled.
fn guard_zero(std: f64) -> f64 {
    if std > 0.0 {
        std
    } else {
        1.0
    }
}
