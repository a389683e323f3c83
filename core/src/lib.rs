//! Core spectral-QC and seafloor-compliance pipeline for OBS shear-velocity inversion.
//!
//! The modules follow the processing chain: daily auto/cross spectra with
//! window-rejection QC, normalized compliance and coherence through partial
//! coherence removal, station aggregation, synthetic training-data generation,
//! and percentile bounds over sampled velocity profiles.

pub mod math;
pub mod prelude;
pub mod processing;
pub mod records;
pub mod telemetry;

pub use prelude::{ComplianceError, ComplianceResult, DensityEstimator, ForwardSolver};
