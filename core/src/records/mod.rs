pub mod compliance;
pub mod mixture;
pub mod model;
pub mod scaling;
pub mod spectral;
pub mod station;

pub use compliance::ComplianceDay;
pub use mixture::MixtureParams;
pub use model::{Layer, LayeredModel, Petrophysics, StationProfile, TrainingExample};
pub use scaling::FeatureScaling;
pub use spectral::{DayTraces, RawDay, SpectralDay};
pub use station::{FrequencyBand, StationCatalog, StationReference};

use crate::prelude::{ComplianceError, ComplianceResult};

pub(crate) fn ensure_len(name: &str, actual: usize, expected: usize) -> ComplianceResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ComplianceError::InvalidInput(format!(
            "{name} has {actual} entries, expected {expected}"
        )))
    }
}
