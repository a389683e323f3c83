pub mod aggregate;
pub mod compliance;
pub mod inversion;
pub mod percentile;
pub mod spectral;
pub mod synthetic;

pub use aggregate::StationAggregator;
pub use compliance::{admittance, coherence, phase, ComplianceCoherence};
pub use inversion::{InversionConfig, InversionResult, Inverter, TrainingMatrices};
pub use percentile::PercentileEstimator;
pub use spectral::{QcReport, SpectralEstimator, SpectralOutcome};
pub use synthetic::{Examples, GeneratorConfig, GeneratorStats, SyntheticModelGenerator};
