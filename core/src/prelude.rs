use crate::records::{LayeredModel, MixtureParams};
use serde::{Deserialize, Serialize};

/// Shared configuration for the daily spectral estimation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Sampling rate of every channel [Hz].
    pub sample_rate: f64,
    /// Samples in a full day record at `sample_rate`.
    pub expected_samples: usize,
    /// Length of individual windows within a day [s].
    pub window_length_sec: f64,
    /// Window overlap as a fraction in [0, 1).
    pub overlap_fraction: f64,
    /// Minimum number of windows surviving QC for the day to be kept.
    pub min_good_windows: usize,
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    /// Boxcar width applied to the log-PSDs before QC.
    pub smoothing_width: usize,
    /// Rejection threshold in standard deviations of the window penalty.
    pub penalty_sigma: f64,
    /// Significance level of the F-test accepting a rejection round.
    pub ftest_alpha: f64,
    pub max_qc_iterations: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            expected_samples: 86_400,
            window_length_sec: 3600.0,
            overlap_fraction: 0.5,
            min_good_windows: 10,
            band_low_hz: 0.004,
            band_high_hz: 2.0,
            smoothing_width: 50,
            penalty_sigma: 2.0,
            ftest_alpha: 0.05,
            max_qc_iterations: 100,
        }
    }
}

impl SpectralConfig {
    pub fn window_samples(&self) -> usize {
        (self.window_length_sec * self.sample_rate) as usize
    }

    pub fn overlap_samples(&self) -> usize {
        (self.window_length_sec * self.overlap_fraction * self.sample_rate) as usize
    }
}

/// Common error type for the compliance pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ComplianceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("degenerate spectrum: {0} is zero everywhere")]
    DegenerateSpectrum(&'static str),
    #[error("no positive real wavenumber for omega {omega} at depth {depth} m")]
    NoPositiveRoot { omega: f64, depth: f64 },
    #[error("{count} positive real wavenumbers for omega {omega} at depth {depth} m")]
    AmbiguousRoot { omega: f64, depth: f64, count: usize },
    #[error("constraint unsatisfied: accepted {accepted} of {requested} after {attempts} attempts")]
    ConstraintUnsatisfied {
        accepted: usize,
        requested: usize,
        attempts: usize,
    },
    #[error("no days survived the coherence filter ({total} candidates)")]
    EmptyAggregate { total: usize },
    #[error("cancelled after {0} accepted items")]
    Cancelled(usize),
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

pub type ComplianceResult<T> = Result<T, ComplianceError>;

/// Forward normalized-compliance solver for a layered elastic structure.
pub trait ForwardSolver {
    /// Returns normalized compliance at each of `frequencies` [Hz] for a
    /// station at `depth` [m] above `model`.
    fn compute(
        &self,
        depth: f64,
        frequencies: &[f64],
        model: &LayeredModel,
    ) -> ComplianceResult<Vec<f64>>;
}

/// Trained density estimator mapping a scaled compliance signal to a mixture
/// distribution over Bernstein coefficients.
pub trait DensityEstimator {
    fn predict(&self, features: &[f64]) -> ComplianceResult<MixtureParams>;
}
